//! Test-only helper for building an `Engine` over a scratch directory.

use std::sync::Arc;

use tempfile::TempDir;

use rlm_export::{GithubClient, LocalDiskClient};
use rlm_storage::{BlobStore, MetaStore};

use crate::engine::Engine;

/// Build an `Engine` backed by a fresh temporary directory. The directory is
/// intentionally leaked for the duration of the test process: callers only
/// get the `Engine` back, not the `TempDir` guard, so there is nothing to
/// hold it alive otherwise. The OS tmp reaper cleans these up.
pub fn test_engine() -> Engine {
    let dir = TempDir::new().expect("create temp dir for test engine");
    let base = dir.path().to_path_buf();
    std::mem::forget(dir);

    let meta = MetaStore::open(base.join("meta.db")).expect("open meta store");
    let blobs = BlobStore::open(base.join("blobs")).expect("open blob store");
    let github: Arc<dyn GithubClient> = Arc::new(LocalDiskClient::new(base.join("github")));

    Engine::new(meta, blobs, base.join("indexes"), 50 * 1024 * 1024, github)
}
