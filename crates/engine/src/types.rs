//! Request/response shapes for the tool surface. These are
//! the typed payloads `ToolRequest` variants carry and the typed structs
//! handlers return; `Engine::handle` serializes the latter to JSON for the
//! transport seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rlm_core::{ArtifactProvenance, ChunkStrategy, SessionConfig, SpanRef};

/// Source descriptors accepted by `docs.load`. Distinct from
/// `rlm_core::DocumentSource`, which is the persisted form: load-only
/// parameters (hints, traversal flags, glob patterns) live here and are
/// consumed before a `Document` row is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadSource {
    Inline {
        content: String,
        token_count_hint: Option<u64>,
    },
    File {
        path: String,
        token_count_hint: Option<u64>,
    },
    Glob {
        path: String,
        #[serde(default)]
        recursive: bool,
        include_pattern: Option<String>,
        exclude_pattern: Option<String>,
    },
    Directory {
        path: String,
        #[serde(default)]
        recursive: bool,
        include_pattern: Option<String>,
        exclude_pattern: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Bm25,
    Regex,
    Literal,
}

/// The one request type the engine matches exhaustively. A JSON body's
/// `"tool"` field selects the variant by its canonical `rlm.*` name; adding
/// a tool without a matching arm in `Engine::handle` is a compile error, not
/// a silently-ignored runtime name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool")]
pub enum ToolRequest {
    #[serde(rename = "rlm.session.create")]
    SessionCreate {
        name: Option<String>,
        config: Option<SessionConfig>,
    },
    #[serde(rename = "rlm.session.info")]
    SessionInfo { session_id: String },
    #[serde(rename = "rlm.session.close")]
    SessionClose { session_id: String },
    #[serde(rename = "rlm.docs.load")]
    DocsLoad {
        session_id: String,
        sources: Vec<LoadSource>,
    },
    #[serde(rename = "rlm.docs.list")]
    DocsList {
        session_id: String,
        #[serde(default = "default_list_limit")]
        limit: usize,
        #[serde(default)]
        offset: usize,
    },
    #[serde(rename = "rlm.docs.peek")]
    DocsPeek {
        session_id: String,
        doc_id: String,
        #[serde(default)]
        start: usize,
        end: Option<usize>,
    },
    #[serde(rename = "rlm.chunk.create")]
    ChunkCreate {
        session_id: String,
        doc_id: String,
        strategy: ChunkStrategy,
    },
    #[serde(rename = "rlm.span.get")]
    SpanGet {
        session_id: String,
        span_ids: Vec<String>,
    },
    #[serde(rename = "rlm.search.query")]
    SearchQuery {
        session_id: String,
        query: String,
        #[serde(default = "default_search_method")]
        method: SearchMethod,
        doc_ids: Option<Vec<String>>,
        #[serde(default = "default_search_limit")]
        limit: usize,
        #[serde(default = "default_context_chars")]
        context_chars: usize,
    },
    #[serde(rename = "rlm.artifact.store")]
    ArtifactStore {
        session_id: String,
        #[serde(rename = "type")]
        kind: String,
        #[serde(default = "default_artifact_content")]
        content: Value,
        span_id: Option<String>,
        span: Option<SpanRef>,
        provenance: Option<ArtifactProvenance>,
    },
    #[serde(rename = "rlm.artifact.list")]
    ArtifactList {
        session_id: String,
        span_id: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
    #[serde(rename = "rlm.artifact.get")]
    ArtifactGet {
        session_id: String,
        artifact_id: String,
    },
    #[serde(rename = "rlm.export.github")]
    ExportGithub {
        session_id: String,
        repo: String,
        branch: Option<String>,
        path: Option<String>,
        #[serde(default)]
        include_docs: bool,
        #[serde(default)]
        redact: bool,
        #[serde(default)]
        allow_secrets: bool,
    },
}

fn default_list_limit() -> usize {
    50
}

fn default_search_limit() -> usize {
    10
}

fn default_context_chars() -> usize {
    200
}

fn default_search_method() -> SearchMethod {
    SearchMethod::Bm25
}

fn default_artifact_content() -> Value {
    Value::Null
}

impl ToolRequest {
    pub fn session_id(&self) -> &str {
        match self {
            ToolRequest::SessionCreate { .. } => "",
            ToolRequest::SessionInfo { session_id }
            | ToolRequest::SessionClose { session_id }
            | ToolRequest::DocsLoad { session_id, .. }
            | ToolRequest::DocsList { session_id, .. }
            | ToolRequest::DocsPeek { session_id, .. }
            | ToolRequest::ChunkCreate { session_id, .. }
            | ToolRequest::SpanGet { session_id, .. }
            | ToolRequest::SearchQuery { session_id, .. }
            | ToolRequest::ArtifactStore { session_id, .. }
            | ToolRequest::ArtifactList { session_id, .. }
            | ToolRequest::ArtifactGet { session_id, .. }
            | ToolRequest::ExportGithub { session_id, .. } => session_id,
        }
    }

    /// Canonical `rlm.<category>.<action>` name, for tracing and for the
    /// budget-exemption check (`session.create` and `session.close`).
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::SessionCreate { .. } => "rlm.session.create",
            ToolRequest::SessionInfo { .. } => "rlm.session.info",
            ToolRequest::SessionClose { .. } => "rlm.session.close",
            ToolRequest::DocsLoad { .. } => "rlm.docs.load",
            ToolRequest::DocsList { .. } => "rlm.docs.list",
            ToolRequest::DocsPeek { .. } => "rlm.docs.peek",
            ToolRequest::ChunkCreate { .. } => "rlm.chunk.create",
            ToolRequest::SpanGet { .. } => "rlm.span.get",
            ToolRequest::SearchQuery { .. } => "rlm.search.query",
            ToolRequest::ArtifactStore { .. } => "rlm.artifact.store",
            ToolRequest::ArtifactList { .. } => "rlm.artifact.list",
            ToolRequest::ArtifactGet { .. } => "rlm.artifact.get",
            ToolRequest::ExportGithub { .. } => "rlm.export.github",
        }
    }
}

// --- Response payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreateResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub config: SessionConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfoResponse {
    pub session_id: String,
    pub name: Option<String>,
    pub status: rlm_core::SessionStatus,
    pub document_count: usize,
    pub span_count: usize,
    pub artifact_count: usize,
    pub total_chars: u64,
    pub total_tokens_est: u64,
    pub tool_calls_used: u64,
    pub tool_calls_remaining: u64,
    pub index_built: bool,
    pub config: SessionConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCloseSummary {
    pub documents: usize,
    pub spans: usize,
    pub artifacts: usize,
    pub tool_calls: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCloseResponse {
    pub session_id: String,
    pub status: rlm_core::SessionStatus,
    pub closed_at: DateTime<Utc>,
    pub summary: SessionCloseSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedDoc {
    pub doc_id: String,
    pub content_hash: String,
    pub length_chars: usize,
    pub length_tokens_est: u64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadError {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsLoadResponse {
    pub loaded: Vec<LoadedDoc>,
    pub errors: Vec<LoadError>,
    pub total_chars: u64,
    pub total_tokens_est: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocListEntry {
    pub doc_id: String,
    pub source: String,
    pub length_chars: usize,
    pub length_tokens_est: u64,
    pub span_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsListResponse {
    pub documents: Vec<DocListEntry>,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsPeekResponse {
    pub content: String,
    pub span: SpanRef,
    pub content_hash: String,
    pub truncated: bool,
    pub total_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkSpanOut {
    pub span_id: String,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub content_hash: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkCreateResponse {
    pub spans: Vec<ChunkSpanOut>,
    pub total_spans: usize,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanOut {
    pub span_id: String,
    pub doc_id: String,
    pub start: usize,
    pub end: usize,
    pub content: String,
    pub content_hash: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanGetResponse {
    pub spans: Vec<SpanOut>,
    pub total_chars_returned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatchOut {
    pub doc_id: String,
    pub score: f64,
    pub context: String,
    pub highlight_start: usize,
    pub highlight_end: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchQueryResponse {
    pub matches: Vec<SearchMatchOut>,
    pub total_matches: usize,
    pub index_built: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStoreResponse {
    pub artifact_id: String,
    pub span_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOut {
    pub artifact_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub span_id: Option<String>,
    pub provenance: Option<ArtifactProvenance>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<ArtifactOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactGetResponse {
    pub artifact_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub provenance: Option<ArtifactProvenance>,
    pub span: Option<SpanRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportGithubResponse {
    pub branch: String,
    pub commit_sha: String,
    pub export_path: String,
    pub files_exported: usize,
    pub warnings: Vec<String>,
    pub secrets_found: usize,
}
