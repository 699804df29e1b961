//! Source-to-destination path mapping.
//!
//! Every entry under a source root keeps its path relative to the root's
//! parent, and the destination is that relative path joined onto the
//! destination root. Matching is per path component, so a root name that
//! reappears deeper in the tree is never rewritten.

use std::path::{Path, PathBuf};

use crate::model::SourceRoot;

#[derive(Debug, Clone)]
pub struct PathMapping {
    /// Source root's parent; the root itself when it has none
    base: PathBuf,
    root: PathBuf,
    destination_root: PathBuf,
}

impl PathMapping {
    pub fn new(source_root: &SourceRoot, destination_root: &Path) -> Self {
        let root = source_root.path().to_path_buf();
        let base = source_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.clone());
        PathMapping {
            base,
            root,
            destination_root: destination_root.to_path_buf(),
        }
    }

    /// Relative path of the source root itself (its final segment).
    pub fn root_relative(&self) -> PathBuf {
        self.relative_path(&self.root).unwrap_or_default()
    }

    /// Path of `path` relative to the source root's parent, or `None` if
    /// `path` does not lie under the source root.
    fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        if !path.starts_with(&self.root) {
            return None;
        }
        path.strip_prefix(&self.base).ok().map(Path::to_path_buf)
    }

    /// Destination for an entry given its relative path.
    pub fn destination_for(&self, relative: &Path) -> PathBuf {
        self.destination_root.join(relative)
    }
}
