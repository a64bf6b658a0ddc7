use thiserror::Error;

/// Result type alias for rlm-mcp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the session engine and its subcomponents.
///
/// Every variant maps to a row of the error taxonomy: `kind()` classifies it
/// into the handling policy (surface / record-in-batch / log-and-absent /
/// log-and-continue) so callers don't have to re-derive that at each site.
#[derive(Debug, Error)]
pub enum Error {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("span not found: {0}")]
    SpanNotFound(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("cross-session reference: {0}")]
    CrossSessionReference(String),

    #[error("budget exceeded: used {used}/{max}")]
    BudgetExceeded { used: u64, max: u64 },

    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("unknown source kind: {0}")]
    UnknownSource(String),

    #[error("oversize source: {0}")]
    OversizeSource(String),

    #[error("content missing for hash: {0}")]
    ContentMissing(String),

    #[error("session already closed: {0}")]
    AlreadyClosed(String),

    #[error("export blocked: {count} secrets found")]
    SecretsBlocked { count: usize },

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Handling policy a caller should apply to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Surface immediately to the caller; no retry, no side effects beyond the trace.
    Surface,
    /// Record into a batch `errors[]` response field; the batch continues.
    RecordInBatch,
    /// Log and treat the underlying resource as absent; caller rebuilds.
    LogAndAbsent,
    /// Log and continue; does not fail the enclosing operation (e.g. close).
    LogAndContinue,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownSource(_) | Error::OversizeSource(_) => ErrorKind::RecordInBatch,
            Error::IndexCorrupted(_) => ErrorKind::LogAndAbsent,
            Error::Storage(_) => ErrorKind::Surface,
            _ => ErrorKind::Surface,
        }
    }

    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Error::SessionNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exceeded_displays_counts() {
        let err = Error::BudgetExceeded { used: 100, max: 100 };
        assert!(err.to_string().contains("100/100"));
    }

    #[test]
    fn unknown_source_is_record_in_batch() {
        let err = Error::UnknownSource("carrier-pigeon".into());
        assert_eq!(err.kind(), ErrorKind::RecordInBatch);
    }

    #[test]
    fn index_corrupted_is_log_and_absent() {
        let err = Error::IndexCorrupted("truncated file".into());
        assert_eq!(err.kind(), ErrorKind::LogAndAbsent);
    }
}
