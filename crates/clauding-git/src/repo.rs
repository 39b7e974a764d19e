use std::path::{Path, PathBuf};

use tracing::debug;

use crate::command::GitCli;
use crate::error::GitError;

/// Root of the work tree containing `path`.
pub fn discover_work_tree(path: &Path, git: &GitCli) -> Result<PathBuf, GitError> {
    match git.run(path, ["rev-parse", "--is-inside-work-tree"]) {
        Ok(answer) if answer == "true" => {}
        Ok(_) | Err(GitError::CommandFailed { .. }) => {
            return Err(GitError::NotARepository {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(err),
    }
    let root = git.run(path, ["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(root))
}

pub fn current_branch(path: &Path, git: &GitCli) -> Result<String, GitError> {
    git.run(path, ["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Abbreviated HEAD commit, or `None` when `path` is not a repository or has
/// no commits yet.
pub fn short_head_hash(path: &Path, git: &GitCli) -> Option<String> {
    if !path.is_dir() {
        return None;
    }
    match git.run(path, ["rev-parse", "--short", "HEAD"]) {
        Ok(hash) if !hash.is_empty() => Some(hash),
        Ok(_) => None,
        Err(err) => {
            debug!(path = %path.display(), "no resolvable HEAD: {err}");
            None
        }
    }
}
