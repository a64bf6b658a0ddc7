//! `rlm.chunk.create`.

use chrono::Utc;

use rlm_core::{generate_id, ChunkStrategy, Document, Result, Span};

use crate::engine::Engine;
use crate::types::{ChunkCreateResponse, ChunkSpanOut};

/// Characters of content shown in each span's `preview` field.
const PREVIEW_CHARS: usize = 80;

/// `rlm.chunk.create`. Strategy parameters are validated at construction:
/// an invalid strategy never reaches the chunk loop. Reuse is detected by
/// exact-equality comparison of the strategy descriptor already stored on
/// the document's spans with the requested one; on a match, the existing
/// spans are returned with `cached = true` instead of re-chunking.
pub fn create(engine: &Engine, session_id: &str, doc_id: &str, strategy: ChunkStrategy) -> Result<ChunkCreateResponse> {
    rlm_chunk::validate(&strategy)?;
    let doc = engine.require_document(session_id, doc_id)?;

    let existing = engine.meta.get_spans_by_document(doc_id)?;
    let matching: Vec<Span> = existing.into_iter().filter(|s| s.strategy == strategy).collect();
    if !matching.is_empty() {
        return to_response(engine, &doc, matching, true);
    }

    let content = engine.blobs.require(&doc.content_hash)?;
    let offsets = rlm_chunk::chunk(&strategy, &content)?;
    let chars: Vec<char> = content.chars().collect();

    let mut spans = Vec::with_capacity(offsets.len());
    for (start, end) in offsets {
        let slice: String = chars[start..end].iter().collect();
        let content_hash = engine.blobs.put(&slice)?;
        let span = Span {
            id: generate_id(),
            document_id: doc.id.clone(),
            start_offset: start,
            end_offset: end,
            content_hash,
            strategy: strategy.clone(),
            created_at: Utc::now(),
        };
        engine.meta.create_span(&span)?;
        spans.push(span);
    }
    to_response(engine, &doc, spans, false)
}

fn to_response(engine: &Engine, _doc: &Document, mut spans: Vec<Span>, cached: bool) -> Result<ChunkCreateResponse> {
    spans.sort_by_key(|s| s.start_offset);
    let mut out = Vec::with_capacity(spans.len());
    for (index, span) in spans.iter().enumerate() {
        let content = engine.blobs.get(&span.content_hash)?.unwrap_or_default();
        let preview: String = content.chars().take(PREVIEW_CHARS).collect();
        out.push(ChunkSpanOut {
            span_id: span.id.clone(),
            index,
            start: span.start_offset,
            end: span.end_offset,
            length: span.end_offset - span.start_offset,
            content_hash: span.content_hash.clone(),
            preview,
        });
    }
    let total_spans = out.len();
    Ok(ChunkCreateResponse { spans: out, total_spans, cached })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs;
    use crate::session;
    use crate::test_support::test_engine;

    fn load_one(engine: &Engine, content: &str) -> (String, String) {
        let sid = session::create(engine, None, None).unwrap().session_id;
        let resp = docs::load(engine, &sid, vec![crate::types::LoadSource::Inline {
            content: content.to_string(),
            token_count_hint: None,
        }])
        .unwrap();
        (sid, resp.loaded[0].doc_id.clone())
    }

    #[test]
    fn fixed_strategy_produces_spans_with_matching_content_hash() {
        let engine = test_engine();
        let (sid, doc_id) = load_one(&engine, "abcdefghij");
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 0, max_chunks: None };
        let resp = create(&engine, &sid, &doc_id, strategy).unwrap();
        assert_eq!(resp.total_spans, 3);
        assert!(!resp.cached);
        assert!(resp.spans.iter().all(|s| s.length <= 4));
    }

    #[test]
    fn repeating_the_same_strategy_is_a_cache_hit() {
        let engine = test_engine();
        let (sid, doc_id) = load_one(&engine, "abcdefghij");
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 0, max_chunks: None };
        let first = create(&engine, &sid, &doc_id, strategy.clone()).unwrap();
        let second = create(&engine, &sid, &doc_id, strategy).unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.total_spans, second.total_spans);
    }

    #[test]
    fn different_strategy_on_same_document_is_not_a_cache_hit() {
        let engine = test_engine();
        let (sid, doc_id) = load_one(&engine, "abcdefghij");
        let a = ChunkStrategy::Fixed { chunk_size: 4, overlap: 0, max_chunks: None };
        let b = ChunkStrategy::Fixed { chunk_size: 2, overlap: 0, max_chunks: None };
        let first = create(&engine, &sid, &doc_id, a).unwrap();
        let second = create(&engine, &sid, &doc_id, b).unwrap();
        assert!(!first.cached);
        assert!(!second.cached);
        assert_ne!(first.total_spans, second.total_spans);
    }

    #[test]
    fn invalid_strategy_is_rejected_before_any_span_is_created() {
        let engine = test_engine();
        let (sid, doc_id) = load_one(&engine, "abcdefgh");
        let strategy = ChunkStrategy::Fixed { chunk_size: 4, overlap: 4, max_chunks: None };
        assert!(create(&engine, &sid, &doc_id, strategy).is_err());
        assert_eq!(engine.meta.count_spans(&sid).unwrap(), 0);
    }
}
