//! Export manifest construction: the directory tree shape and
//! naming defaults a session export produces, independent of how (or
//! whether) it is actually uploaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub doc_id: String,
    pub source: String,
    pub content_hash: String,
    pub length_chars: usize,
    /// Whether this document's content was actually materialized into the
    /// export tree (`include_docs`), or only referenced by metadata.
    pub included: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArtifactEntry {
    pub artifact_id: String,
    pub kind: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: String,
    pub exported_at: DateTime<Utc>,
    pub documents: Vec<ManifestDocument>,
    pub artifacts: Vec<ManifestArtifactEntry>,
    pub trace_file: String,
    pub secrets_redacted: bool,
    pub secrets_found: usize,
}

/// Default branch name: `rlm/session/<UTC-timestamp>-<session_id[:8]>`.
pub fn default_branch(session_id: &str, now: DateTime<Utc>) -> String {
    format!(
        "rlm/session/{}-{}",
        now.format("%Y%m%dT%H%M%SZ"),
        short_id(session_id)
    )
}

/// Default export path: `.rlm/sessions/<UTC-timestamp>_<session_id[:8]>`.
pub fn default_path(session_id: &str, now: DateTime<Utc>) -> String {
    format!(
        ".rlm/sessions/{}_{}",
        now.format("%Y%m%dT%H%M%SZ"),
        short_id(session_id)
    )
}

fn short_id(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}

/// One file per artifact, named by its id, under `artifacts/`.
pub fn artifact_file_name(artifact_id: &str) -> String {
    format!("artifacts/{artifact_id}.json")
}

pub const TRACE_FILE_NAME: &str = "trace.jsonl";
