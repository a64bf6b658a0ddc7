use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use rlm_core::{Artifact, Document, Error, Result, Session, Span, TraceEntry};

/// Current on-disk schema version. A persisted file whose version exceeds
/// this is refused outright.
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaState {
    schema_version: u32,
    sessions: FxHashMap<String, Session>,
    documents: FxHashMap<String, Document>,
    spans: FxHashMap<String, Span>,
    artifacts: FxHashMap<String, Artifact>,
    traces: Vec<TraceEntry>,
}

impl MetaState {
    fn new() -> Self {
        MetaState {
            schema_version: SCHEMA_VERSION,
            ..Default::default()
        }
    }
}

/// Single-file transactional metadata store holding the five logical tables
/// (sessions, documents, spans, artifacts, traces). Exposes typed operations
/// over in-memory state backed by whole-file atomic persistence, not raw SQL.
///
/// All mutation is serialized through a single mutex, which makes every
/// mutating call here "atomic" in the sense the concurrency model requires:
/// no cross-process coordination is attempted.
pub struct MetaStore {
    path: PathBuf,
    state: Mutex<MetaState>,
}

impl MetaStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            let state: MetaState = match bincode::deserialize(&bytes) {
                Ok(s) => s,
                Err(e) => return Err(Error::Storage(format!("corrupted metadata store: {e}"))),
            };
            if state.schema_version > SCHEMA_VERSION {
                return Err(Error::Storage(format!(
                    "metadata store schema version {} exceeds supported version {}",
                    state.schema_version, SCHEMA_VERSION
                )));
            }
            state
        } else {
            MetaState::new()
        };
        let store = MetaStore {
            path,
            state: Mutex::new(state),
        };
        store.persist_locked(&store.state.lock())?;
        Ok(store)
    }

    /// Atomic write-temp-then-rename persistence, matching the pattern the
    /// teacher's `ManifestManager::persist` uses for its MANIFEST file.
    fn persist_locked(&self, state: &MetaState) -> Result<()> {
        let bytes = bincode::serialize(state)?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            if parent.exists() {
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }
        }
        Ok(())
    }

    // --- Session operations ---

    pub fn create_session(&self, session: &Session) -> Result<()> {
        let mut state = self.state.lock();
        state.sessions.insert(session.id.clone(), session.clone());
        self.persist_locked(&state)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.state.lock().sessions.get(session_id).cloned())
    }

    pub fn update_session(&self, session: &Session) -> Result<()> {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session.id) {
            return Err(Error::SessionNotFound(session.id.clone()));
        }
        state.sessions.insert(session.id.clone(), session.clone());
        self.persist_locked(&state)
    }

    /// Atomic read-modify-write; fails if the session is absent. The single
    /// mutex guarding `state` is what makes concurrent increments race-free.
    pub fn increment_tool_calls(&self, session_id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.tool_calls_used += 1;
        let new_count = session.tool_calls_used;
        self.persist_locked(&state)?;
        Ok(new_count)
    }

    /// Atomic conditional increment: the race-free budget enforcement
    /// primitive the session budget relies on. Returns `(allowed, used)`.
    pub fn try_increment_tool_calls(&self, session_id: &str, max: u64) -> Result<(bool, u64)> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        if session.tool_calls_used < max {
            session.tool_calls_used += 1;
            let used = session.tool_calls_used;
            self.persist_locked(&state)?;
            Ok((true, used))
        } else {
            Ok((false, session.tool_calls_used))
        }
    }

    // --- Document operations ---

    pub fn create_document(&self, document: &Document) -> Result<()> {
        let mut state = self.state.lock();
        state.documents.insert(document.id.clone(), document.clone());
        self.persist_locked(&state)
    }

    /// Insert a batch of documents as a single all-or-nothing transaction.
    /// Applies to the successes of a load batch, not to sources that already
    /// failed upstream.
    pub fn create_documents_batch(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        for doc in documents {
            state.documents.insert(doc.id.clone(), doc.clone());
        }
        self.persist_locked(&state)
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().documents.get(doc_id).cloned())
    }

    pub fn get_documents(&self, session_id: &str, limit: usize, offset: usize) -> Result<Vec<Document>> {
        let state = self.state.lock();
        let mut docs: Vec<&Document> = state
            .documents
            .values()
            .filter(|d| d.session_id == session_id)
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn count_documents(&self, session_id: &str) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .documents
            .values()
            .filter(|d| d.session_id == session_id)
            .count())
    }

    /// Sums of `length_chars` and `length_tokens_est` across a session's documents.
    pub fn get_session_stats(&self, session_id: &str) -> Result<(u64, u64)> {
        let state = self.state.lock();
        let (mut chars, mut tokens) = (0u64, 0u64);
        for doc in state.documents.values().filter(|d| d.session_id == session_id) {
            chars += doc.length_chars as u64;
            tokens += doc.length_tokens_est;
        }
        Ok((chars, tokens))
    }

    /// `(doc_id, content_hash)` pairs for fingerprint computation, ordered by
    /// `doc_id` for determinism (the caller is responsible for ordering; this
    /// returns them unsorted from the map and `rlm-index` sorts by id).
    pub fn get_document_fingerprints(&self, session_id: &str) -> Result<Vec<(String, String)>> {
        let state = self.state.lock();
        Ok(state
            .documents
            .values()
            .filter(|d| d.session_id == session_id)
            .map(|d| (d.id.clone(), d.content_hash.clone()))
            .collect())
    }

    // --- Span operations ---

    pub fn create_span(&self, span: &Span) -> Result<()> {
        let mut state = self.state.lock();
        state.spans.insert(span.id.clone(), span.clone());
        self.persist_locked(&state)
    }

    pub fn get_span(&self, span_id: &str) -> Result<Option<Span>> {
        Ok(self.state.lock().spans.get(span_id).cloned())
    }

    pub fn get_spans_by_document(&self, document_id: &str) -> Result<Vec<Span>> {
        let state = self.state.lock();
        let mut spans: Vec<Span> = state
            .spans
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        spans.sort_by_key(|s| s.start_offset);
        Ok(spans)
    }

    pub fn count_spans(&self, session_id: &str) -> Result<usize> {
        let state = self.state.lock();
        let doc_ids: std::collections::HashSet<&String> = state
            .documents
            .values()
            .filter(|d| d.session_id == session_id)
            .map(|d| &d.id)
            .collect();
        Ok(state
            .spans
            .values()
            .filter(|s| doc_ids.contains(&s.document_id))
            .count())
    }

    pub fn count_spans_for_document(&self, document_id: &str) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .spans
            .values()
            .filter(|s| s.document_id == document_id)
            .count())
    }

    // --- Artifact operations ---

    pub fn create_artifact(&self, artifact: &Artifact) -> Result<()> {
        let mut state = self.state.lock();
        state.artifacts.insert(artifact.id.clone(), artifact.clone());
        self.persist_locked(&state)
    }

    pub fn get_artifact(&self, artifact_id: &str) -> Result<Option<Artifact>> {
        Ok(self.state.lock().artifacts.get(artifact_id).cloned())
    }

    pub fn get_artifacts(
        &self,
        session_id: &str,
        span_id: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Vec<Artifact>> {
        let state = self.state.lock();
        let mut artifacts: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|a| a.session_id == session_id)
            .filter(|a| span_id.map_or(true, |sid| a.span_id.as_deref() == Some(sid)))
            .filter(|a| kind.map_or(true, |k| a.kind == k))
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(artifacts)
    }

    pub fn count_artifacts(&self, session_id: &str) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .artifacts
            .values()
            .filter(|a| a.session_id == session_id)
            .count())
    }

    // --- Trace operations ---

    pub fn create_trace(&self, trace: &TraceEntry) -> Result<()> {
        let mut state = self.state.lock();
        state.traces.push(trace.clone());
        self.persist_locked(&state)
    }

    pub fn get_traces(&self, session_id: &str) -> Result<Vec<TraceEntry>> {
        let state = self.state.lock();
        let mut traces: Vec<TraceEntry> = state
            .traces
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        traces.sort_by_key(|t| t.timestamp);
        Ok(traces)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
