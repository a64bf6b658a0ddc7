//! The session engine: tool dispatch, per-session locking, and the index cache.
//! Owns the per-session lock map, the in-memory index cache, and references
//! to the metadata store, blob store, and index-persistence subcomponent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use rlm_core::{Document, Error, Result, Session, Span, TraceEntry};
use rlm_search::Bm25Index;
use rlm_storage::{BlobStore, MetaStore};

use crate::types::ToolRequest;

/// Safety cap on documents loaded into a single built index: beyond this the
/// index covers only the first N, deterministically ordered, and a warning
/// is logged. Queries still return.
const MAX_INDEX_DOCUMENTS: usize = 100_000;

pub struct Engine {
    pub(crate) meta: MetaStore,
    pub(crate) blobs: BlobStore,
    index_dir: PathBuf,
    index_cache: DashMap<String, Bm25Index>,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
    pub(crate) max_file_size_bytes: u64,
    pub(crate) github: Arc<dyn rlm_export::GithubClient>,
}

impl Engine {
    pub fn new(
        meta: MetaStore,
        blobs: BlobStore,
        index_dir: impl Into<PathBuf>,
        max_file_size_bytes: u64,
        github: Arc<dyn rlm_export::GithubClient>,
    ) -> Self {
        Engine {
            meta,
            blobs,
            index_dir: index_dir.into(),
            index_cache: DashMap::new(),
            session_locks: DashMap::new(),
            max_file_size_bytes,
            github,
        }
    }

    /// Get-or-create the per-session mutex. `entry().or_insert_with()` takes
    /// only the one shard lock it needs, never a lock across the whole map,
    /// and never across the I/O the returned mutex subsequently guards.
    fn session_mutex(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn drop_session_mutex(&self, session_id: &str) {
        self.session_locks.remove(session_id);
    }

    pub(crate) fn require_session(&self, session_id: &str) -> Result<Session> {
        self.meta
            .get_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    fn session_index_dir(&self, session_id: &str) -> PathBuf {
        rlm_index::session_dir(&self.index_dir, session_id)
    }

    /// Fetch a document and verify it belongs to `session_id`.
    pub(crate) fn require_document(&self, session_id: &str, doc_id: &str) -> Result<Document> {
        let doc = self
            .meta
            .get_document(doc_id)?
            .ok_or_else(|| Error::DocumentNotFound(doc_id.to_string()))?;
        if doc.session_id != session_id {
            return Err(Error::CrossSessionReference(format!(
                "document {doc_id} belongs to a different session"
            )));
        }
        Ok(doc)
    }

    /// Fetch a span and verify, by walking span -> document -> session, that
    /// it belongs to `session_id`.
    pub(crate) fn require_span(&self, session_id: &str, span_id: &str) -> Result<(Span, Document)> {
        let span = self
            .meta
            .get_span(span_id)?
            .ok_or_else(|| Error::SpanNotFound(span_id.to_string()))?;
        let doc = self.require_document(session_id, &span.document_id).map_err(|_| {
            Error::CrossSessionReference(format!("span {span_id} belongs to a different session"))
        })?;
        Ok((span, doc))
    }

    /// Dispatch one tool call end to end: session lookup, budget reservation,
    /// handler dispatch, trace write. The whole call runs inside a
    /// correlation span carrying `operation`/`session_id`, which is Rust's
    /// replacement for a hand-rolled thread-local correlation id: the span
    /// guard's drop is the "exit" record, with no explicit cleanup to forget.
    pub fn handle(&self, req: ToolRequest) -> Result<Value> {
        let operation = req.name();
        let session_id = req.session_id().to_string();
        let span = tracing::info_span!("tool_call", operation, session_id = %session_id);
        let _guard = span.enter();
        let started = Instant::now();

        let input = serde_json::to_value(&req).unwrap_or(Value::Null);
        let result = self.dispatch(req, &session_id);
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            tracing::error!(error = %e, duration_ms, "tool call failed");
        } else {
            tracing::debug!(duration_ms, "tool call complete");
        }

        // session.create has no pre-existing session to key its trace on;
        // on success, the session it just created is the right key instead.
        let trace_session_id = if operation == "rlm.session.create" {
            result
                .as_ref()
                .ok()
                .and_then(|v| v.get("session_id"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default()
        } else {
            session_id
        };
        self.write_trace(&trace_session_id, operation, input, &result, duration_ms);
        result
    }

    fn dispatch(&self, req: ToolRequest, session_id: &str) -> Result<Value> {
        // session.create is the only operation without a pre-existing session.
        if let ToolRequest::SessionCreate { name, config } = req {
            let out = crate::session::create(self, name, config)?;
            return Ok(serde_json::to_value(out)?);
        }

        let session = self.require_session(session_id)?;

        // session.close is exempt from budget; everything else reserves one
        // unit before dispatch.
        let is_close = matches!(req, ToolRequest::SessionClose { .. });
        if !is_close {
            let (allowed, used) = self
                .meta
                .try_increment_tool_calls(session_id, session.config.max_tool_calls)?;
            if !allowed {
                return Err(Error::BudgetExceeded {
                    used,
                    max: session.config.max_tool_calls,
                });
            }
        }

        let value = match req {
            ToolRequest::SessionCreate { .. } => unreachable!("handled above"),
            ToolRequest::SessionInfo { session_id } => {
                serde_json::to_value(crate::session::info(self, &session_id)?)?
            }
            ToolRequest::SessionClose { session_id } => {
                serde_json::to_value(crate::session::close(self, &session_id)?)?
            }
            ToolRequest::DocsLoad { session_id, sources } => {
                serde_json::to_value(crate::docs::load(self, &session_id, sources)?)?
            }
            ToolRequest::DocsList { session_id, limit, offset } => {
                serde_json::to_value(crate::docs::list(self, &session_id, limit, offset)?)?
            }
            ToolRequest::DocsPeek { session_id, doc_id, start, end } => {
                serde_json::to_value(crate::docs::peek(self, &session_id, &doc_id, start, end)?)?
            }
            ToolRequest::ChunkCreate { session_id, doc_id, strategy } => {
                serde_json::to_value(crate::chunk::create(self, &session_id, &doc_id, strategy)?)?
            }
            ToolRequest::SpanGet { session_id, span_ids } => {
                serde_json::to_value(crate::span::get(self, &session_id, span_ids)?)?
            }
            ToolRequest::SearchQuery { session_id, query, method, doc_ids, limit, context_chars } => {
                serde_json::to_value(crate::search::query(
                    self, &session_id, &query, method, doc_ids, limit, context_chars,
                )?)?
            }
            ToolRequest::ArtifactStore { session_id, kind, content, span_id, span, provenance } => {
                serde_json::to_value(crate::artifact::store(
                    self, &session_id, kind, content, span_id, span, provenance,
                )?)?
            }
            ToolRequest::ArtifactList { session_id, span_id, kind } => {
                serde_json::to_value(crate::artifact::list(self, &session_id, span_id, kind)?)?
            }
            ToolRequest::ArtifactGet { session_id, artifact_id } => {
                serde_json::to_value(crate::artifact::get(self, &session_id, &artifact_id)?)?
            }
            ToolRequest::ExportGithub {
                session_id,
                repo,
                branch,
                path,
                include_docs,
                redact,
                allow_secrets,
            } => serde_json::to_value(crate::export::run(
                self, &session_id, &repo, branch, path, include_docs, redact, allow_secrets,
            )?)?,
        };
        Ok(value)
    }

    fn write_trace(&self, session_id: &str, operation: &str, input: Value, result: &Result<Value>, duration_ms: u64) {
        if session_id.is_empty() {
            return;
        }
        let output = match result {
            Ok(v) => v.clone(),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        let trace = TraceEntry {
            id: rlm_core::generate_id(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            operation: operation.to_string(),
            input,
            output,
            duration_ms,
            client_reported: None,
        };
        if let Err(e) = self.meta.create_trace(&trace) {
            tracing::warn!(error = %e, session_id, operation, "failed to write trace entry");
        }
    }

    /// Run `f` under the session's per-session lock. Returns the closure's
    /// result; the lock is dropped either way.
    pub(crate) fn with_session_lock<T>(&self, session_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.session_mutex(session_id);
        let _guard = lock.lock();
        f()
    }

    /// Get-or-build-index algorithm. Must be called under the
    /// session lock.
    pub(crate) fn get_or_build_index(&self, session_id: &str) -> Result<Bm25Index> {
        if let Some(index) = self.index_cache.get(session_id) {
            return Ok(index.clone());
        }

        let fingerprint_pairs = self.meta.get_document_fingerprints(session_id)?;
        let doc_count = fingerprint_pairs.len();
        let fingerprint = rlm_index::compute_fingerprint(fingerprint_pairs);

        let dir = self.session_index_dir(session_id);
        if let Some((metadata, index)) = rlm_index::load(&dir)? {
            if !rlm_index::is_stale(&metadata, doc_count, &fingerprint) {
                self.index_cache.insert(session_id.to_string(), index.clone());
                return Ok(index);
            }
        }

        let mut docs = self.meta.get_documents(session_id, MAX_INDEX_DOCUMENTS, 0)?;
        if docs.len() >= MAX_INDEX_DOCUMENTS {
            tracing::warn!(
                session_id,
                cap = MAX_INDEX_DOCUMENTS,
                "session document count exceeds index safety cap, indexing only the first N"
            );
        }
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let mut index = Bm25Index::new();
        for doc in &docs {
            let content = self.blobs.require(&doc.content_hash)?;
            index.add_document(doc.id.clone(), content);
        }
        index.build();

        self.index_cache.insert(session_id.to_string(), index.clone());
        Ok(index)
    }

    /// Unconditional invalidation after a successful documents-load: drop
    /// both the in-memory cache entry and the persisted directory.
    pub(crate) fn invalidate_index(&self, session_id: &str) -> Result<()> {
        self.index_cache.remove(session_id);
        rlm_index::invalidate(&self.session_index_dir(session_id))
    }

    /// Persist the session's in-memory index (if any) and drop it from the
    /// cache, as part of session close. Persistence failures are logged but
    /// never propagated.
    pub(crate) fn persist_and_evict_index(&self, session_id: &str) {
        let index = self.index_cache.remove(session_id).map(|(_, v)| v);
        let Some(index) = index else { return };

        let result: Result<()> = (|| {
            let pairs = self.meta.get_document_fingerprints(session_id)?;
            let doc_count = pairs.len();
            let fingerprint = rlm_index::compute_fingerprint(pairs);
            let metadata = rlm_index::new_metadata(session_id, doc_count, fingerprint);
            rlm_index::save(&self.session_index_dir(session_id), &metadata, &index)
        })();

        if let Err(e) = result {
            tracing::warn!(error = %e, session_id, "failed to persist index on session close");
        }
    }

    pub(crate) fn index_is_cached(&self, session_id: &str) -> bool {
        self.index_cache.contains_key(session_id)
    }

    pub(crate) fn forget_session_lock(&self, session_id: &str) {
        self.drop_session_mutex(session_id);
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_engine;
    use crate::types::ToolRequest;

    #[test]
    fn session_create_writes_a_trace_entry_keyed_on_the_new_session() {
        let engine = test_engine();
        let result = engine
            .handle(ToolRequest::SessionCreate { name: None, config: None })
            .unwrap();
        let session_id = result["session_id"].as_str().unwrap().to_string();

        let traces = engine.meta.get_traces(&session_id).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].operation, "rlm.session.create");
        assert_eq!(traces[0].session_id, session_id);
    }
}
