use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use rlm_core::{Error, Result};

/// Content-addressed, append-only blob storage, keyed by SHA-256 hex of the
/// UTF-8 bytes of the content. Layout: `root/hh/hhhh...` where `hh` is the
/// first two hex characters of the key.
///
/// Character offsets throughout this store are over Unicode scalar values
/// (`char`), not bytes, held consistently with the chunker and the
/// fingerprint hash.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(BlobStore { root })
    }

    fn shard_path(&self, hash: &str) -> PathBuf {
        let prefix = &hash[..2.min(hash.len())];
        self.root.join(prefix).join(hash)
    }

    /// Compute the content hash without writing anything.
    pub fn hash(&self, content: &str) -> String {
        hex::encode(Sha256::digest(content.as_bytes()))
    }

    /// Store content, returning its hash. Idempotent: a write is skipped if
    /// the target file already exists.
    pub fn put(&self, content: &str) -> Result<String> {
        let hash = self.hash(content);
        let path = self.shard_path(&hash);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content.as_bytes())?;
        }
        Ok(hash)
    }

    /// Retrieve the whole payload for a hash, or `None` if absent.
    pub fn get(&self, hash: &str) -> Result<Option<String>> {
        let path = self.shard_path(hash);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Fallible retrieval that surfaces a `content_missing` error instead of
    /// `None`, for call sites that treat a missing blob as a hard failure.
    pub fn require(&self, hash: &str) -> Result<String> {
        self.get(hash)?
            .ok_or_else(|| Error::ContentMissing(hash.to_string()))
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.shard_path(hash).exists()
    }

    /// Delete a blob. Rarely used — blobs may be referenced by other
    /// sessions — but kept for out-of-band cleanup tooling.
    pub fn delete(&self, hash: &str) -> Result<bool> {
        let path = self.shard_path(hash);
        if path.exists() {
            fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Character-indexed slice; `end = -1` (represented as `None` here) means
    /// "to the end of the content".
    pub fn get_slice(&self, hash: &str, start: usize, end: Option<usize>) -> Result<Option<String>> {
        let content = match self.get(hash)? {
            Some(c) => c,
            None => return Ok(None),
        };
        let chars: Vec<char> = content.chars().collect();
        let end = end.unwrap_or(chars.len()).min(chars.len());
        let start = start.min(end);
        Ok(Some(chars[start..end].iter().collect()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    proptest! {
        /// `get_slice` must agree with indexing the content's own `Vec<char>`
        /// for any in-bounds `start..end`, including multi-byte scalars.
        #[test]
        fn get_slice_matches_manual_char_indexing(
            content in "[a-zA-Z0-9 éàüñ日本語]{0,80}",
            seed_a in 0usize..200,
            seed_b in 0usize..200,
        ) {
            let dir = tempdir().unwrap();
            let store = BlobStore::open(dir.path()).unwrap();
            let hash = store.put(&content).unwrap();
            let chars: Vec<char> = content.chars().collect();
            let len = chars.len();
            if len > 0 {
                let start = seed_a % len;
                let end = start + (seed_b % (len - start + 1));
                let expected: String = chars[start..end].iter().collect();
                let actual = store.get_slice(&hash, start, Some(end)).unwrap().unwrap();
                prop_assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let hash = store.put("hello world").unwrap();
        assert_eq!(store.get(&hash).unwrap().as_deref(), Some("hello world"));
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let a = store.put("same content").unwrap();
        let b = store.put("same content").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn get_slice_handles_minus_one_as_to_end() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let hash = store.put("abcdef").unwrap();
        assert_eq!(store.get_slice(&hash, 2, None).unwrap().as_deref(), Some("cdef"));
        assert_eq!(store.get_slice(&hash, 0, Some(3)).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn get_slice_is_over_unicode_scalars_not_bytes() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let hash = store.put("héllo").unwrap();
        // byte-slicing [0..2] would panic/misbehave on the 2-byte 'é'; char
        // indexing treats it as a single unit.
        assert_eq!(store.get_slice(&hash, 0, Some(2)).unwrap().as_deref(), Some("hé"));
    }

    #[test]
    fn missing_hash_returns_none() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        assert!(store.get("0".repeat(64).as_str()).unwrap().is_none());
    }

    #[test]
    fn shard_layout_uses_first_two_hex_chars() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let hash = store.put("x").unwrap();
        let shard = &hash[..2];
        assert!(dir.path().join(shard).join(&hash).exists());
    }

    #[test]
    fn consistent_after_random_put_delete_ops() {
        use rand::prelude::*;
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let mut rng = rand::thread_rng();
        let mut live: std::collections::HashMap<String, String> = std::collections::HashMap::new();

        for _ in 0..500 {
            let op: u8 = rng.gen_range(0..3);
            match op {
                0 => {
                    let content = format!("content-{}", rng.gen::<u32>() % 50);
                    let hash = store.put(&content).unwrap();
                    live.insert(hash, content);
                }
                1 => {
                    if let Some(hash) = live.keys().choose(&mut rng).cloned() {
                        store.delete(&hash).unwrap();
                        live.remove(&hash);
                    }
                }
                _ => {
                    if let Some((hash, content)) = live.iter().choose(&mut rng) {
                        assert_eq!(store.get(hash).unwrap().as_ref(), Some(content));
                    }
                }
            }
        }

        for (hash, content) in &live {
            assert_eq!(store.get(hash).unwrap().as_ref(), Some(content));
        }
    }
}
