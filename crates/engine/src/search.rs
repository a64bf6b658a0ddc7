//! `rlm.search.query`: bm25, regex, and literal methods.

use std::collections::HashSet;

use regex::RegexBuilder;

use rlm_core::{Error, Result};

use crate::engine::Engine;
use crate::types::{SearchMatchOut, SearchMethod, SearchQueryResponse};

/// One candidate match before context extraction: a document, a score, a
/// char offset to center the context window on, and the char length of the
/// thing that matched (for highlight-end computation).
struct RawMatch {
    doc_id: String,
    score: f64,
    position: usize,
    match_len: usize,
}

pub fn query(
    engine: &Engine,
    session_id: &str,
    query_text: &str,
    method: SearchMethod,
    doc_ids: Option<Vec<String>>,
    limit: usize,
    context_chars: usize,
) -> Result<SearchQueryResponse> {
    let session = engine.require_session(session_id)?;
    let allowed: Option<HashSet<String>> = doc_ids.map(|v| v.into_iter().collect());
    let limit = limit.max(1);

    let raw_matches = match method {
        SearchMethod::Bm25 => engine.with_session_lock(session_id, || {
            bm25_matches(engine, session_id, query_text, allowed.as_ref(), limit)
        })?,
        SearchMethod::Regex => regex_matches(engine, session_id, query_text, allowed.as_ref(), limit, false)?,
        SearchMethod::Literal => regex_matches(engine, session_id, query_text, allowed.as_ref(), limit, true)?,
    };
    let index_built = engine.index_is_cached(session_id);
    let total_matches = raw_matches.len();

    let cap = session.config.max_chars_per_response;
    let mut matches_out = Vec::with_capacity(raw_matches.len());
    let mut total_chars = 0usize;

    for rm in raw_matches {
        let doc = engine.require_document(session_id, &rm.doc_id)?;
        let content = engine.blobs.require(&doc.content_hash)?;
        let chars: Vec<char> = content.chars().collect();

        let half = context_chars / 2;
        let ctx_start = rm.position.saturating_sub(half).min(chars.len());
        let ctx_end = (rm.position + (context_chars - half)).min(chars.len()).max(ctx_start);
        let context_slice = &chars[ctx_start..ctx_end];

        let mut highlight_start = rm.position.saturating_sub(ctx_start).min(context_slice.len());
        let mut highlight_end = (highlight_start + rm.match_len).min(context_slice.len());
        highlight_start = highlight_start.min(highlight_end);

        let mut context: String = context_slice.iter().collect();

        let remaining = cap.saturating_sub(total_chars);
        if remaining == 0 {
            break;
        }
        let ctx_len = context.chars().count();
        let mut truncated = false;
        if ctx_len > remaining {
            context = context.chars().take(remaining).collect();
            let new_len = context.chars().count();
            highlight_end = highlight_end.min(new_len);
            highlight_start = highlight_start.min(highlight_end);
            truncated = true;
        }
        total_chars += context.chars().count();

        matches_out.push(SearchMatchOut {
            doc_id: rm.doc_id,
            score: rm.score,
            context,
            highlight_start,
            highlight_end,
            truncated,
        });

        if truncated {
            break;
        }
    }

    Ok(SearchQueryResponse { matches: matches_out, total_matches, index_built })
}

/// BM25 search with an allow-list filter. Because the underlying index may
/// rank non-allowed documents above allowed ones, keep expanding the inner
/// query limit (doubling) until either enough allowed results are collected
/// or the expansion cap (the document count) is reached — the loop cannot
/// diverge because `inner_limit` is bounded above by `doc_count`.
fn bm25_matches(
    engine: &Engine,
    session_id: &str,
    query_text: &str,
    allowed: Option<&HashSet<String>>,
    limit: usize,
) -> Result<Vec<RawMatch>> {
    let index = engine.get_or_build_index(session_id)?;
    let doc_count = index.doc_count().max(1);

    let mut inner_limit = limit;
    let mut collected: Vec<(String, f64, String)> = Vec::new();
    loop {
        let results = index.search(query_text, inner_limit);
        collected = results
            .into_iter()
            .filter(|(doc_id, _, _)| allowed.map_or(true, |a| a.contains(doc_id)))
            .collect();
        if collected.len() >= limit || inner_limit >= doc_count {
            break;
        }
        inner_limit = (inner_limit * 2).min(doc_count);
    }
    collected.truncate(limit);

    let query_terms = rlm_search::tokenize(query_text);
    Ok(collected
        .into_iter()
        .map(|(doc_id, score, content)| {
            let (position, match_len) = bm25_match_position(&content, query_text, &query_terms);
            RawMatch { doc_id, score, position, match_len }
        })
        .collect())
}

/// "Match position" for a BM25 hit: the first occurrence of
/// the literal query, else of the first query token, else 0 with a
/// zero-length highlight.
fn bm25_match_position(content: &str, query_text: &str, query_terms: &[String]) -> (usize, usize) {
    let lower_content = content.to_lowercase();
    let lower_query = query_text.to_lowercase();

    if !lower_query.is_empty() {
        if let Some(byte_pos) = lower_content.find(&lower_query) {
            let char_pos = lower_content[..byte_pos].chars().count();
            return (char_pos, query_text.chars().count());
        }
    }
    if let Some(first_token) = query_terms.first() {
        if let Some(byte_pos) = lower_content.find(first_token.as_str()) {
            let char_pos = lower_content[..byte_pos].chars().count();
            return (char_pos, first_token.chars().count());
        }
    }
    (0, 0)
}

/// Regex/literal scan: case-insensitive, one match per non-overlapping
/// occurrence, constant score 1.0.
fn regex_matches(
    engine: &Engine,
    session_id: &str,
    query_text: &str,
    allowed: Option<&HashSet<String>>,
    limit: usize,
    literal: bool,
) -> Result<Vec<RawMatch>> {
    let pattern = if literal { regex::escape(query_text) } else { query_text.to_string() };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidStrategy(format!("invalid search pattern: {e}")))?;

    let docs = engine.meta.get_documents(session_id, 100_000, 0)?;
    let mut raw = Vec::new();
    'docs: for doc in docs {
        if let Some(a) = allowed {
            if !a.contains(&doc.id) {
                continue;
            }
        }
        let content = engine.blobs.require(&doc.content_hash)?;
        let byte_to_char = byte_to_char_table(&content);
        for m in re.find_iter(&content) {
            if raw.len() >= limit {
                break 'docs;
            }
            let char_start = byte_to_char[m.start()];
            let char_end = byte_to_char[m.end()];
            raw.push(RawMatch {
                doc_id: doc.id.clone(),
                score: 1.0,
                position: char_start,
                match_len: char_end - char_start,
            });
        }
    }
    Ok(raw)
}

fn byte_to_char_table(content: &str) -> Vec<usize> {
    let mut table = vec![0usize; content.len() + 1];
    let mut char_idx = 0;
    for (byte_idx, _) in content.char_indices() {
        table[byte_idx] = char_idx;
        char_idx += 1;
    }
    table[content.len()] = char_idx;
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs;
    use crate::session;
    use crate::test_support::test_engine;
    use crate::types::LoadSource;

    fn load(engine: &Engine, sid: &str, content: &str) -> String {
        docs::load(engine, sid, vec![LoadSource::Inline { content: content.to_string(), token_count_hint: None }])
            .unwrap()
            .loaded[0]
            .doc_id
            .clone()
    }

    #[test]
    fn bm25_search_ranks_relevant_document_first() {
        let engine = test_engine();
        let sid = session::create(&engine, None, None).unwrap().session_id;
        load(&engine, &sid, "the quick brown fox jumps");
        load(&engine, &sid, "completely unrelated whales content");

        let resp = query(&engine, &sid, "fox", SearchMethod::Bm25, None, 10, 40).unwrap();
        assert!(resp.index_built);
        assert!(!resp.matches.is_empty());
        for m in &resp.matches {
            assert!(m.highlight_start <= m.highlight_end);
            assert!(m.highlight_end <= m.context.chars().count());
        }
    }

    #[test]
    fn literal_search_is_case_insensitive_substring_match() {
        let engine = test_engine();
        let sid = session::create(&engine, None, None).unwrap().session_id;
        load(&engine, &sid, "Hello World");

        let resp = query(&engine, &sid, "hello", SearchMethod::Literal, None, 10, 20).unwrap();
        assert_eq!(resp.total_matches, 1);
        assert_eq!(resp.matches[0].score, 1.0);
    }

    #[test]
    fn doc_ids_filter_restricts_bm25_results() {
        let engine = test_engine();
        let sid = session::create(&engine, None, None).unwrap().session_id;
        let keep = load(&engine, &sid, "apple apple apple banana");
        let _drop = load(&engine, &sid, "apple apple apple apple apple");

        let resp = query(&engine, &sid, "apple", SearchMethod::Bm25, Some(vec![keep.clone()]), 5, 30).unwrap();
        assert!(resp.matches.iter().all(|m| m.doc_id == keep));
    }

    #[test]
    fn highlight_offsets_stay_in_range_after_cap_truncation() {
        let engine = test_engine();
        let sid = session::create(
            &engine,
            None,
            Some(rlm_core::SessionConfig { max_chars_per_response: 5, ..Default::default() }),
        )
        .unwrap()
        .session_id;
        load(&engine, &sid, "needle in a haystack of surrounding words");

        let resp = query(&engine, &sid, "needle", SearchMethod::Literal, None, 10, 40).unwrap();
        assert_eq!(resp.matches.len(), 1);
        assert!(resp.matches[0].truncated);
        assert!(resp.matches[0].highlight_end <= resp.matches[0].context.chars().count());
    }
}
