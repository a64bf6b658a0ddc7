//! The outbound upload to a remote code-hosting provider is an external
//! collaborator: this trait is the seam the export operation
//! drives, plus a local-disk implementation for tests and for running the
//! server without network access.

use std::fs;
use std::path::PathBuf;

use rlm_core::Result;

/// What the export operation needs from a code-hosting provider. A real
/// implementation (HTTP client against GitHub's REST API) lives in
/// `rlm-server`, out of scope here.
pub trait GithubClient: Send + Sync {
    /// Create `branch` off the repository's default branch if it does not
    /// already exist. The provider's default branch itself is never
    /// modified.
    fn ensure_branch(&self, repo: &str, branch: &str) -> Result<()>;

    /// Write `content` to `path` on `branch`, returning the resulting commit
    /// sha.
    fn put_file(&self, repo: &str, branch: &str, path: &str, content: &[u8]) -> Result<String>;
}

/// Writes to a local directory tree instead of a real provider. Used by
/// tests and by deployments that want `export.github`'s manifest/secret-scan
/// behavior without a network dependency.
pub struct LocalDiskClient {
    root: PathBuf,
}

impl LocalDiskClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDiskClient { root: root.into() }
    }
}

impl GithubClient for LocalDiskClient {
    fn ensure_branch(&self, repo: &str, branch: &str) -> Result<()> {
        fs::create_dir_all(self.root.join(repo).join(branch))?;
        Ok(())
    }

    fn put_file(&self, repo: &str, branch: &str, path: &str, content: &[u8]) -> Result<String> {
        let full_path = self.root.join(repo).join(branch).join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;
        Ok(rlm_core_content_sha(content))
    }
}

/// A stand-in "commit sha": the content hash of everything written this
/// call. A real provider would return its own commit sha; this keeps the
/// local client's return type honest without faking git internals.
fn rlm_core_content_sha(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_disk_client_writes_files_under_repo_and_branch() {
        let dir = tempdir().unwrap();
        let client = LocalDiskClient::new(dir.path());
        client.ensure_branch("org/repo", "rlm/session/x").unwrap();
        client
            .put_file("org/repo", "rlm/session/x", "manifest.json", b"{}")
            .unwrap();
        assert!(dir
            .path()
            .join("org/repo/rlm/session/x/manifest.json")
            .exists());
    }
}
