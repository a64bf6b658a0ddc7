//! Two-tier (memory + disk) persistence for a session's search index.
//! The in-memory [`rlm_search::Bm25Index`] is the hot path; this crate is
//! the cold path that survives a restart, plus the fingerprint machinery
//! that tells the engine whether a reload would be stale before it pays the
//! cost of a rebuild.
//!
//! Layout: `indexes/<session_id>/index.bin` and
//! `indexes/<session_id>/metadata.bin`, written independently so a reader can
//! inspect the fingerprint tuple without deserializing the (potentially
//! large) index body.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use rlm_core::Result;
use rlm_search::Bm25Index;

const SCHEMA_VERSION: u32 = 1;

/// Sidecar metadata persisted alongside the index: the staleness tuple plus
/// enough bookkeeping to refuse a too-new schema on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub schema_version: u32,
    pub session_id: String,
    pub tokenizer_name: String,
    pub doc_count: usize,
    pub fingerprint: String,
}

pub fn new_metadata(session_id: impl Into<String>, doc_count: usize, fingerprint: String) -> IndexMetadata {
    IndexMetadata {
        schema_version: SCHEMA_VERSION,
        session_id: session_id.into(),
        tokenizer_name: rlm_search::TOKENIZER_NAME.to_string(),
        doc_count,
        fingerprint,
    }
}

/// Whether a previously-persisted index still matches the session's current
/// document set: any of doc count, fingerprint, or tokenizer name differing
/// is staleness.
pub fn is_stale(metadata: &IndexMetadata, current_doc_count: usize, current_fingerprint: &str) -> bool {
    metadata.doc_count != current_doc_count
        || metadata.fingerprint != current_fingerprint
        || metadata.tokenizer_name != rlm_search::TOKENIZER_NAME
}

/// SHA-256 hex digest of the session's `(doc_id, content_hash)` pairs,
/// sorted by `doc_id` for determinism. Two sessions with the same documents
/// loaded in different orders yield the same fingerprint; any insert,
/// delete, or content change yields a different one.
pub fn compute_fingerprint(mut pairs: Vec<(String, String)>) -> String {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = Sha256::new();
    for (doc_id, content_hash) in &pairs {
        hasher.update(doc_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// The per-session directory holding `index.bin`/`metadata.bin`.
pub fn session_dir(index_dir: &Path, session_id: &str) -> PathBuf {
    index_dir.join(session_id)
}

fn index_file(dir: &Path) -> PathBuf {
    dir.join("index.bin")
}

fn metadata_file(dir: &Path) -> PathBuf {
    dir.join("metadata.bin")
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Atomically persist `index` and `metadata` under `dir` as two sibling
/// files, each via write-temp/fsync/rename — the same pattern
/// `rlm_storage`'s metadata store uses for its own persistence.
pub fn save(dir: &Path, metadata: &IndexMetadata, index: &Bm25Index) -> Result<()> {
    atomic_write(&metadata_file(dir), &bincode::serialize(metadata)?)?;
    atomic_write(&index_file(dir), &bincode::serialize(index)?)?;
    Ok(())
}

/// Load a persisted index from `dir`. A missing, unreadable, or corrupt pair
/// of files is treated as absent: the whole session directory is removed
/// and `Ok(None)` returned, so the engine falls back to a full rebuild
/// rather than surfacing an error for a condition it can always recover
/// from.
pub fn load(dir: &Path) -> Result<Option<(IndexMetadata, Bm25Index)>> {
    let meta_path = metadata_file(dir);
    let idx_path = index_file(dir);
    if !meta_path.exists() || !idx_path.exists() {
        return Ok(None);
    }

    let discard = |reason: &str| {
        tracing::warn!(path = %dir.display(), reason, "discarding persisted index");
        let _ = fs::remove_dir_all(dir);
    };

    let meta_bytes = match fs::read(&meta_path) {
        Ok(b) => b,
        Err(e) => {
            discard(&e.to_string());
            return Ok(None);
        }
    };
    let metadata: IndexMetadata = match bincode::deserialize(&meta_bytes) {
        Ok(m) => m,
        Err(e) => {
            discard(&e.to_string());
            return Ok(None);
        }
    };
    if metadata.schema_version > SCHEMA_VERSION {
        discard("schema version newer than supported");
        return Ok(None);
    }

    let idx_bytes = match fs::read(&idx_path) {
        Ok(b) => b,
        Err(e) => {
            discard(&e.to_string());
            return Ok(None);
        }
    };
    let index: Bm25Index = match bincode::deserialize(&idx_bytes) {
        Ok(i) => i,
        Err(e) => {
            discard(&e.to_string());
            return Ok(None);
        }
    };

    Ok(Some((metadata, index)))
}

/// Remove a session's persisted index directory entirely, used on
/// unconditional invalidation after a successful `docs.load`. Absent
/// directories are not an error.
pub fn invalidate(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn fingerprint_is_order_independent() {
        let a = vec![("d1".to_string(), "h1".to_string()), ("d2".to_string(), "h2".to_string())];
        let b = vec![("d2".to_string(), "h2".to_string()), ("d1".to_string(), "h1".to_string())];
        assert_eq!(compute_fingerprint(a), compute_fingerprint(b));
    }

    proptest! {
        /// Shuffling (here: reversing) the `(doc_id, content_hash)` pairs
        /// fed to `compute_fingerprint` must never change the result -- a
        /// staleness check keyed on this fingerprint depends on it being
        /// insensitive to the in-memory iteration order of the documents
        /// table.
        #[test]
        fn fingerprint_ignores_input_order(
            pairs in proptest::collection::vec(("[a-z]{1,8}", "[a-z0-9]{1,16}"), 0..16)
        ) {
            let pairs: Vec<(String, String)> = pairs;
            let forward = compute_fingerprint(pairs.clone());
            let mut reversed = pairs;
            reversed.reverse();
            let backward = compute_fingerprint(reversed);
            prop_assert_eq!(forward, backward);
        }
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = vec![("d1".to_string(), "h1".to_string())];
        let b = vec![("d1".to_string(), "h2".to_string())];
        assert_ne!(compute_fingerprint(a), compute_fingerprint(b));
    }

    #[test]
    fn save_then_load_round_trips() {
        let root = tempdir().unwrap();
        let dir = session_dir(root.path(), "sess1");
        let mut index = Bm25Index::new();
        index.add_document("d1", "hello world");
        index.build();
        let metadata = new_metadata("sess1", 1, "fp1".to_string());

        save(&dir, &metadata, &index).unwrap();
        let (loaded_meta, loaded_index) = load(&dir).unwrap().unwrap();
        assert_eq!(loaded_meta.fingerprint, "fp1");
        assert_eq!(loaded_index.content("d1"), Some("hello world"));
    }

    #[test]
    fn load_missing_directory_returns_none() {
        let root = tempdir().unwrap();
        let dir = session_dir(root.path(), "nope");
        assert!(load(&dir).unwrap().is_none());
    }

    #[test]
    fn load_corrupted_metadata_discards_and_returns_none() {
        let root = tempdir().unwrap();
        let dir = session_dir(root.path(), "sess1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(metadata_file(&dir), b"garbage").unwrap();
        fs::write(index_file(&dir), b"garbage").unwrap();
        assert!(load(&dir).unwrap().is_none());
        assert!(!dir.exists());
    }

    #[test]
    fn staleness_detects_fingerprint_and_doc_count_drift() {
        let metadata = new_metadata("sess1", 1, "fp1".to_string());
        assert!(!is_stale(&metadata, 1, "fp1"));
        assert!(is_stale(&metadata, 1, "fp2"));
        assert!(is_stale(&metadata, 2, "fp1"));
    }

    #[test]
    fn invalidate_removes_session_directory() {
        let root = tempdir().unwrap();
        let dir = session_dir(root.path(), "sess1");
        let mut index = Bm25Index::new();
        index.build();
        save(&dir, &new_metadata("sess1", 0, "fp".to_string()), &index).unwrap();
        assert!(dir.exists());
        invalidate(&dir).unwrap();
        assert!(!dir.exists());
    }
}
