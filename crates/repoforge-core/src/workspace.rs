//! Job-scoped scratch directories.
//!
//! A [`Workspace`] is released exactly once: explicitly through
//! [`Workspace::close`], or by its `Drop` guard when the handle goes out of
//! scope on an error or panic path.

use std::io;
use std::path::{Path, PathBuf};

use crate::keys::DEFINITION_FILE;
use crate::obs;

const PACKAGES_DIR: &str = "packages";
const GENERATED_DIR: &str = "generated-repositories";

/// Allocates workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path a job's workspace lives at.
    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Create (if absent) and return the workspace for `job_id`.
    pub async fn open(&self, job_id: &str) -> io::Result<Workspace> {
        let path = self.path_for(job_id);
        tokio::fs::create_dir_all(&path).await?;
        tracing::debug!(path = %path.display(), "workspace opened");
        Ok(Workspace {
            path,
            released: false,
        })
    }
}

/// Owned handle to one job's directory tree.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root of staged packages.
    pub fn packages_dir(&self) -> PathBuf {
        self.path.join(PACKAGES_DIR)
    }

    /// Where packages from `origin` are staged.
    pub fn origin_dir(&self, origin: &str) -> PathBuf {
        self.packages_dir().join(origin)
    }

    /// Output directory for one package system's generated repository.
    pub fn output_dir(&self, package_system: &str) -> PathBuf {
        self.path.join(GENERATED_DIR).join(package_system)
    }

    /// Local copy of the repository definition.
    pub fn definition_path(&self) -> PathBuf {
        self.path.join(DEFINITION_FILE)
    }

    /// Remove the tree. A tree that is already gone is not an error.
    pub async fn close(mut self) -> io::Result<()> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "workspace closed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "workspace released on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => obs::emit_workspace_cleanup_error(&self.path, &e),
        }
    }
}
