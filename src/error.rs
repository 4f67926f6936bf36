use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("I/O error while reading {path}: {message}")]
    TransientIo { path: String, message: String },
    #[error("Watched folder no longer exists: {0}")]
    WatchedRootLost(String),
    #[error("Search reply {0} was superseded")]
    StaleReply(u64),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Search service is not available")]
    SearchUnavailable,
    #[error("Navigation engine has stopped")]
    EngineStopped,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Error: {0}")]
    Generic(String),
}

impl ViewError {
    /// Classify an I/O failure that happened while touching `path`.
    pub fn from_io(error: io::Error, path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => ViewError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => ViewError::AccessDenied(path.to_string()),
            _ => ViewError::TransientIo {
                path: path.to_string(),
                message: error.to_string(),
            },
        }
    }

    /// Errors that are the expected outcome of being superseded. They are
    /// dropped without reaching the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, ViewError::Cancelled | ViewError::StaleReply(_))
    }
}

impl From<String> for ViewError {
    fn from(error: String) -> Self {
        ViewError::Generic(error)
    }
}

impl From<&str> for ViewError {
    fn from(error: &str) -> Self {
        ViewError::Generic(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_io_errors_are_classified() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_matches!(ViewError::from_io(not_found, "C:\\A"), ViewError::NotFound(p) if p == "C:\\A");

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_matches!(ViewError::from_io(denied, "/root"), ViewError::AccessDenied(_));

        let other = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert_matches!(
            ViewError::from_io(other, "/tmp"),
            ViewError::TransientIo { path, .. } if path == "/tmp"
        );
    }

    #[test]
    fn test_silent_errors() {
        assert!(ViewError::Cancelled.is_silent());
        assert!(ViewError::StaleReply(3).is_silent());
        assert!(!ViewError::SearchUnavailable.is_silent());
        assert!(!ViewError::NotFound("x".into()).is_silent());
    }
}
