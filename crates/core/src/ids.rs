use uuid::Uuid;

/// Session-scoped stable identifier. Opaque, 128-bit unique.
pub type SessionId = String;
/// Session-scoped stable identifier for a loaded document.
pub type DocumentId = String;
/// Session-scoped stable identifier for a chunked/manual span.
pub type SpanId = String;
/// Session-scoped stable identifier for a derived artifact.
pub type ArtifactId = String;

/// Generate a new opaque identifier (UUID v4, hyphenated).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
