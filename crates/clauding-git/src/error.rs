use std::path::PathBuf;
use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git could not be started ({command}): {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git exited unsuccessfully ({command}) status={status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("git produced non UTF-8 stdout ({command}): {source}")]
    NonUtf8Output {
        command: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error("not a git work tree: {path}")]
    NotARepository { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::GitError;
    use std::error::Error;
    use std::path::PathBuf;

    #[test]
    fn io_variant_keeps_source() {
        let err = GitError::Io {
            command: "git rev-parse HEAD".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing binary"),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("(git rev-parse HEAD)"));
        assert!(rendered.contains("missing binary"));
        assert!(err.source().is_some());
    }

    #[test]
    fn command_failed_mentions_status_and_stderr() {
        let err = GitError::CommandFailed {
            command: "git rev-parse --short HEAD".to_string(),
            status: Some(128),
            stderr: "fatal: ambiguous argument 'HEAD'".to_string(),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("status=Some(128)"));
        assert!(rendered.contains("ambiguous argument"));
    }

    #[test]
    fn not_a_repository_names_path() {
        let err = GitError::NotARepository {
            path: PathBuf::from("/tmp/plain"),
        };
        assert_eq!(err.to_string(), "not a git work tree: /tmp/plain");
    }
}
