//! Export manifest construction, the secret-scan gate, and the GitHub
//! upload seam.

mod github;
mod manifest;
mod secrets;

pub use github::{GithubClient, LocalDiskClient};
pub use manifest::{
    artifact_file_name, default_branch, default_path, Manifest, ManifestArtifactEntry,
    ManifestDocument, TRACE_FILE_NAME,
};
pub use secrets::{has_secrets, scan, scan_and_redact, SecretMatch};
