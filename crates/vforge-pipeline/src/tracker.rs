//! Cleanup set for one request.
//!
//! Owned by the request and handed between phases by `&mut`: the executor
//! adds stage outputs, fan-out promotes uploaded files, cleanup consumes it.
//! A promoted file is a local copy of something now durable; cleanup still
//! removes it from disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Ephemeral artifacts owned by a single request.
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    pending: BTreeSet<PathBuf>,
    promoted: BTreeSet<PathBuf>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for cleanup. Idempotent.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.promoted.contains(&path) {
            self.pending.insert(path);
        }
    }

    /// Remove a file from the cleanup set after it became durable.
    ///
    /// Returns false if the file was not tracked.
    pub fn promote(&mut self, path: &Path) -> bool {
        if self.pending.remove(path) {
            self.promoted.insert(path.to_path_buf());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains(path)
    }

    pub fn is_promoted(&self, path: &Path) -> bool {
        self.promoted.contains(path)
    }

    /// Local copies of uploaded artifacts.
    pub fn promoted(&self) -> impl Iterator<Item = &Path> {
        self.promoted.iter().map(PathBuf::as_path)
    }

    /// Files still awaiting cleanup.
    pub fn pending(&self) -> impl Iterator<Item = &Path> {
        self.pending.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Consume the tracker, yielding `(pending, promoted)`.
    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        (
            self.pending.into_iter().collect(),
            self.promoted.into_iter().collect(),
        )
    }
}
