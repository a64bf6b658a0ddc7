//! `rlm.docs.load` / `rlm.docs.list` / `rlm.docs.peek`.

use std::fs;
use std::path::{Path, PathBuf};

use rlm_core::{estimate_tokens, generate_id, Document, DocumentSource, Error, Result};
use walkdir::WalkDir;

use crate::engine::Engine;
use crate::globmatch::{glob_to_regex, split_glob_base};
use crate::types::{DocListEntry, DocsListResponse, DocsLoadResponse, DocsPeekResponse, LoadError, LoadSource, LoadedDoc};

struct Candidate {
    label: String,
    source: DocumentSource,
    metadata: serde_json::Map<String, serde_json::Value>,
    content: std::result::Result<String, String>,
    token_hint: Option<u64>,
}

fn read_checked(engine: &Engine, path: &Path) -> std::result::Result<String, String> {
    let meta = fs::metadata(path).map_err(|e| e.to_string())?;
    if meta.len() > engine.max_file_size_bytes {
        return Err(format!("file exceeds size cap of {} bytes", engine.max_file_size_bytes));
    }
    fs::read_to_string(path).map_err(|e| e.to_string())
}

fn walk_matches(base: &Path, recursive: bool, pattern: Option<&regex::Regex>) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut out = Vec::new();
    for entry in WalkDir::new(base).max_depth(max_depth).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(base).unwrap_or(entry.path());
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if let Some(re) = pattern {
            if !re.is_match(&rel_str) {
                continue;
            }
        }
        out.push(entry.path().to_path_buf());
    }
    out
}

fn materialize(engine: &Engine, source: LoadSource) -> Vec<Candidate> {
    match source {
        LoadSource::Inline { content, token_count_hint } => vec![Candidate {
            label: "inline".to_string(),
            source: DocumentSource::Inline,
            metadata: Default::default(),
            content: Ok(content),
            token_hint: token_count_hint,
        }],
        LoadSource::File { path, token_count_hint } => {
            let content = read_checked(engine, Path::new(&path));
            vec![Candidate {
                label: path.clone(),
                source: DocumentSource::File { path },
                metadata: Default::default(),
                content,
                token_hint: token_count_hint,
            }]
        }
        LoadSource::Directory { path, recursive, include_pattern, exclude_pattern } => {
            let base = PathBuf::from(&path);
            let include_re = include_pattern.as_deref().and_then(|p| glob_to_regex(p).ok());
            let exclude_re = exclude_pattern.as_deref().and_then(|p| glob_to_regex(p).ok());
            let files = walk_matches(&base, recursive, include_re.as_ref());
            files
                .into_iter()
                .filter(|f| {
                    let rel = f.strip_prefix(&base).unwrap_or(f).to_string_lossy().replace('\\', "/");
                    !exclude_re.as_ref().is_some_and(|re| re.is_match(&rel))
                })
                .map(|f| {
                    let rel = f.strip_prefix(&base).unwrap_or(&f).to_string_lossy().replace('\\', "/");
                    let content = read_checked(engine, &f);
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("file_path".to_string(), serde_json::Value::String(rel.clone()));
                    Candidate {
                        label: f.display().to_string(),
                        source: DocumentSource::Directory { path: path.clone() },
                        metadata,
                        content,
                        token_hint: None,
                    }
                })
                .collect()
        }
        LoadSource::Glob { path, recursive, include_pattern, exclude_pattern } => {
            let (base, pattern) = split_glob_base(&path);
            let Ok(pattern_re) = glob_to_regex(&pattern) else {
                return vec![Candidate {
                    label: path.clone(),
                    source: DocumentSource::Glob { path },
                    metadata: Default::default(),
                    content: Err("invalid glob pattern".to_string()),
                    token_hint: None,
                }];
            };
            let recursive = recursive || pattern.contains("**");
            let include_re = include_pattern.as_deref().and_then(|p| glob_to_regex(p).ok());
            let exclude_re = exclude_pattern.as_deref().and_then(|p| glob_to_regex(p).ok());
            let files = walk_matches(&base, recursive, Some(&pattern_re));
            files
                .into_iter()
                .filter(|f| {
                    let rel = f.strip_prefix(&base).unwrap_or(f).to_string_lossy().replace('\\', "/");
                    include_re.as_ref().map_or(true, |re| re.is_match(&rel))
                        && !exclude_re.as_ref().is_some_and(|re| re.is_match(&rel))
                })
                .map(|f| {
                    let rel = f.strip_prefix(&base).unwrap_or(&f).to_string_lossy().replace('\\', "/");
                    let content = read_checked(engine, &f);
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("file_path".to_string(), serde_json::Value::String(rel.clone()));
                    Candidate {
                        label: f.display().to_string(),
                        source: DocumentSource::Glob { path: path.clone() },
                        metadata,
                        content,
                        token_hint: None,
                    }
                })
                .collect()
        }
    }
}

/// Load a batch of sources. Each source's failures are recorded in
/// `errors[]`; successfully-loaded documents are inserted as a single
/// metadata-store transaction.
/// A successful load unconditionally invalidates the session's index.
pub fn load(engine: &Engine, session_id: &str, sources: Vec<LoadSource>) -> Result<DocsLoadResponse> {
    engine.require_session(session_id)?;

    let mut documents = Vec::new();
    let mut loaded = Vec::new();
    let mut errors = Vec::new();
    let mut total_chars = 0u64;
    let mut total_tokens_est = 0u64;

    for source in sources {
        for candidate in materialize(engine, source) {
            match candidate.content {
                Ok(content) => {
                    let content_hash = engine.blobs.put(&content)?;
                    let length_chars = content.chars().count();
                    let length_tokens_est = estimate_tokens(length_chars, candidate.token_hint);
                    let doc = Document {
                        id: generate_id(),
                        session_id: session_id.to_string(),
                        content_hash: content_hash.clone(),
                        source: candidate.source.clone(),
                        length_chars,
                        length_tokens_est,
                        metadata: candidate
                            .metadata
                            .into_iter()
                            .collect(),
                        created_at: chrono::Utc::now(),
                    };
                    total_chars += length_chars as u64;
                    total_tokens_est += length_tokens_est;
                    loaded.push(LoadedDoc {
                        doc_id: doc.id.clone(),
                        content_hash,
                        length_chars,
                        length_tokens_est,
                        source: doc.source.display(),
                    });
                    documents.push(doc);
                }
                Err(e) => errors.push(LoadError { source: candidate.label, error: e }),
            }
        }
    }

    if !documents.is_empty() {
        engine.meta.create_documents_batch(&documents)?;
        engine.invalidate_index(session_id)?;
    }

    Ok(DocsLoadResponse { loaded, errors, total_chars, total_tokens_est })
}

pub fn list(engine: &Engine, session_id: &str, limit: usize, offset: usize) -> Result<DocsListResponse> {
    engine.require_session(session_id)?;
    let total = engine.meta.count_documents(session_id)?;
    let docs = engine.meta.get_documents(session_id, limit, offset)?;
    let mut entries = Vec::with_capacity(docs.len());
    for doc in &docs {
        let span_count = engine.meta.count_spans_for_document(&doc.id)?;
        entries.push(DocListEntry {
            doc_id: doc.id.clone(),
            source: doc.source.display(),
            length_chars: doc.length_chars,
            length_tokens_est: doc.length_tokens_est,
            span_count,
            created_at: doc.created_at,
        });
    }
    let has_more = offset + entries.len() < total;
    Ok(DocsListResponse { documents: entries, total, has_more })
}

pub fn peek(
    engine: &Engine,
    session_id: &str,
    doc_id: &str,
    start: usize,
    end: Option<usize>,
) -> Result<DocsPeekResponse> {
    let session = engine.require_session(session_id)?;
    let doc = engine.require_document(session_id, doc_id)?;
    let slice = engine
        .blobs
        .get_slice(&doc.content_hash, start, end)?
        .ok_or_else(|| Error::ContentMissing(doc.content_hash.clone()))?;

    let cap = session.config.max_chars_per_peek;
    let requested_len = slice.chars().count();
    let (content, truncated) = if requested_len > cap {
        (slice.chars().take(cap).collect::<String>(), true)
    } else {
        (slice, false)
    };
    let actual_end = end.unwrap_or(doc.length_chars).min(doc.length_chars);

    Ok(DocsPeekResponse {
        content,
        span: rlm_core::SpanRef { doc_id: doc.id, start, end: actual_end },
        content_hash: doc.content_hash,
        truncated,
        total_length: doc.length_chars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session;
    use crate::test_support::test_engine;

    #[test]
    fn load_inline_then_list_and_peek() {
        let engine = test_engine();
        let created = session::create(&engine, None, None).unwrap();
        let sid = created.session_id;

        let resp = load(&engine, &sid, vec![LoadSource::Inline {
            content: "hello world".to_string(),
            token_count_hint: None,
        }]).unwrap();
        assert_eq!(resp.loaded.len(), 1);
        assert!(resp.errors.is_empty());

        let listed = list(&engine, &sid, 50, 0).unwrap();
        assert_eq!(listed.total, 1);

        let doc_id = resp.loaded[0].doc_id.clone();
        let peeked = peek(&engine, &sid, &doc_id, 0, Some(5)).unwrap();
        assert_eq!(peeked.content, "hello");
        assert!(!peeked.truncated);
    }

    #[test]
    fn unreadable_file_source_is_recorded_as_error_not_raised() {
        let engine = test_engine();
        let created = session::create(&engine, None, None).unwrap();
        let sid = created.session_id;

        let resp = load(&engine, &sid, vec![LoadSource::File {
            path: "/nonexistent/path/for/sure.txt".to_string(),
            token_count_hint: None,
        }]).unwrap();
        assert!(resp.loaded.is_empty());
        assert_eq!(resp.errors.len(), 1);
    }

    #[test]
    fn peek_cross_session_is_rejected() {
        let engine = test_engine();
        let s1 = session::create(&engine, None, None).unwrap().session_id;
        let s2 = session::create(&engine, None, None).unwrap().session_id;
        let resp = load(&engine, &s1, vec![LoadSource::Inline {
            content: "abc".to_string(),
            token_count_hint: None,
        }]).unwrap();
        let doc_id = resp.loaded[0].doc_id.clone();
        let err = peek(&engine, &s2, &doc_id, 0, None).unwrap_err();
        assert!(matches!(err, Error::CrossSessionReference(_)));
    }
}
