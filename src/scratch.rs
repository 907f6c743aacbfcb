//! Scoped temporary directories.
//!
//! Every subprocess invocation and every LLM render owns exactly one
//! [`ScratchScope`]: a temporary directory under the OS temp root with a
//! per-operation unique prefix, deleted on every exit path. Concurrent
//! scopes in the same process never share a path, which keeps downloader
//! caches and segment directories of concurrent runs disjoint.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// An exclusively-owned temporary directory bound to one operation.
///
/// The directory and its contents are removed when the scope is dropped.
/// Use [`ScratchScope::close`] where cleanup failures should surface.
#[derive(Debug)]
pub struct ScratchScope {
    dir: TempDir,
}

impl ScratchScope {
    /// Create a scratch directory named `<op>_<uuid8>_*` under the OS temp root.
    pub fn new(op: &str) -> Result<Self> {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}_{}_", op, &unique[..8]))
            .tempdir()?;
        Ok(Self { dir })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file or subdirectory inside the scope.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a subdirectory inside the scope and return its path.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.file(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Remove the directory now, surfacing any error. Dropping the scope
    /// removes it too, but swallows failures.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}
