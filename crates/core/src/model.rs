use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{generate_id, ArtifactId, DocumentId, SessionId, SpanId};

/// Vendor-neutral token estimation: ~4 chars/token unless the caller supplies a hint.
///
/// Advisory only; consumers should treat it as non-authoritative.
pub fn estimate_tokens(chars: usize, hint: Option<u64>) -> u64 {
    if let Some(hint) = hint {
        return hint;
    }
    ((chars as f64) / 4.0).ceil() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Exported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelHints {
    pub root_model: Option<String>,
    pub subcall_model: Option<String>,
    pub bulk_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_tool_calls: u64,
    pub max_chars_per_response: usize,
    pub max_chars_per_peek: usize,
    pub chunk_cache_enabled: bool,
    pub model_hints: Option<ModelHints>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_tool_calls: 500,
            max_chars_per_response: 50_000,
            max_chars_per_peek: 10_000,
            chunk_cache_enabled: true,
            model_hints: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: Option<String>,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub tool_calls_used: u64,
}

impl Session {
    pub fn new(name: Option<String>, config: SessionConfig) -> Self {
        Session {
            id: generate_id(),
            name,
            status: SessionStatus::Active,
            config,
            created_at: Utc::now(),
            closed_at: None,
            tool_calls_used: 0,
        }
    }
}

/// Source kind for a loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentSource {
    Inline,
    File { path: String },
    Glob { path: String },
    Directory { path: String },
    Url { url: String },
}

impl DocumentSource {
    /// Display form used in `docs.list`/`docs.load` output: the path, the url,
    /// or the literal string `"inline"`.
    pub fn display(&self) -> String {
        match self {
            DocumentSource::Inline => "inline".to_string(),
            DocumentSource::File { path } => path.clone(),
            DocumentSource::Glob { path } => path.clone(),
            DocumentSource::Directory { path } => path.clone(),
            DocumentSource::Url { url } => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub session_id: SessionId,
    pub content_hash: String,
    pub source: DocumentSource,
    pub length_chars: usize,
    pub length_tokens_est: u64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Chunking strategy descriptor, persisted alongside each span it produced.
///
/// Exact-equality comparison of this descriptor is the chunk-reuse cache
/// key; deriving `PartialEq` gives us that comparison for free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkStrategy {
    Fixed {
        chunk_size: usize,
        #[serde(default)]
        overlap: usize,
        #[serde(default)]
        max_chunks: Option<usize>,
    },
    Lines {
        line_count: usize,
        #[serde(default)]
        overlap: usize,
        #[serde(default)]
        max_chunks: Option<usize>,
    },
    Delimiter {
        delimiter: String,
        #[serde(default)]
        max_chunks: Option<usize>,
    },
    /// Produced when an artifact references an ad hoc `{doc_id, start, end}` span
    /// rather than one created by `chunk.create`.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRef {
    pub doc_id: DocumentId,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub document_id: DocumentId,
    pub start_offset: usize,
    pub end_offset: usize,
    pub content_hash: String,
    pub strategy: ChunkStrategy,
    pub created_at: DateTime<Utc>,
}

impl Span {
    pub fn to_ref(&self) -> SpanRef {
        SpanRef {
            doc_id: self.document_id.clone(),
            start: self.start_offset,
            end: self.end_offset,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactProvenance {
    pub model: Option<String>,
    pub prompt_hash: Option<String>,
    pub tool: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub session_id: SessionId,
    pub span_id: Option<SpanId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub provenance: Option<ArtifactProvenance>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub id: String,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub input: Value,
    pub output: Value,
    pub duration_ms: u64,
    pub client_reported: Option<Value>,
}
