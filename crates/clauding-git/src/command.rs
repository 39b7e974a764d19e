use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::GitError;

/// Handle to the `git` binary used for every shell-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    pub binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `git <args>` in `cwd` and return trimmed stdout.
    pub fn run<I, S>(&self, cwd: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary);
        command.current_dir(cwd);
        let mut rendered = self.binary.to_string_lossy().into_owned();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.as_ref().to_string_lossy());
            command.arg(arg.as_ref());
        }

        let output = command.output().map_err(|source| GitError::Io {
            command: rendered.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|source| {
            GitError::NonUtf8Output {
                command: rendered,
                source,
            }
        })?;
        Ok(stdout.trim().to_string())
    }
}
