//! Shared types, identifiers, and error taxonomy for the rlm-mcp session engine.

mod config;
mod error;
mod ids;
mod model;

pub use config::ServerConfig;
pub use error::{Error, ErrorKind, Result};
pub use ids::{generate_id, ArtifactId, DocumentId, SessionId, SpanId};
pub use model::{
    estimate_tokens, Artifact, ArtifactProvenance, ChunkStrategy, Document, DocumentSource,
    ModelHints, Session, SessionConfig, SessionStatus, Span, SpanRef, TraceEntry,
};
