// src/watch/hash.rs

//! Content hashing for rules with `use_hash = true`.
//!
//! Editors often emit several events for one save, and some touch files
//! without changing them. A rule that opts in only fires when the blake3
//! hash of the changed file differs from the one seen last time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

use super::RuleId;

/// Hex blake3 digest of `contents`.
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// Last seen hash per (rule, file).
#[derive(Debug, Default)]
pub struct ContentFilter {
    hashes: HashMap<(RuleId, PathBuf), String>,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` changed since `rule` last saw it. Records the new hash.
    ///
    /// A file that no longer exists counts as changed and is forgotten.
    pub fn changed(&mut self, fs: &dyn FileSystem, rule: RuleId, path: &Path) -> Result<bool> {
        let key = (rule, path.to_path_buf());

        if !fs.is_file(path) {
            self.hashes.remove(&key);
            return Ok(true);
        }

        let hash = content_hash(&fs.read(path)?);
        match self.hashes.get(&key) {
            Some(previous) if *previous == hash => {
                debug!(rule, ?path, "content unchanged");
                Ok(false)
            }
            _ => {
                self.hashes.insert(key, hash);
                Ok(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
