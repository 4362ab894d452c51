//! Repository root resolution
//!
//! Resolves the workspace folder once at startup and normalises it to the
//! working directory of the enclosing repository.

use git2::Repository;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::lister::{ListError, ListResult};

/// Working directory of the repository enclosing `path`, if any
pub fn discover_root(path: &Path) -> Option<PathBuf> {
    let repo = Repository::discover(path).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

/// Resolve the repository root for a workspace location.
///
/// Falls back to the current directory when no location is given. The
/// location must be an existing directory. Inside a repository the root is
/// that repository's working directory; otherwise the location is returned
/// unchanged and git reports the problem when it is run.
pub fn resolve_workspace(location: Option<&Path>) -> ListResult<PathBuf> {
    let location = match location {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().map_err(|e| ListError::NoWorkspace(e.to_string()))?,
    };

    if !location.is_dir() {
        return Err(ListError::NoWorkspace(location.display().to_string()));
    }

    match discover_root(&location) {
        Some(root) => {
            debug!(
                "Workspace {} resolved to repository root {}",
                location.display(),
                root.display()
            );
            Ok(root)
        }
        None => {
            debug!("Workspace {} is not inside a repository", location.display());
            Ok(location)
        }
    }
}
