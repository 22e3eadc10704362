//! Harness-level error taxonomy.
//!
//! Only failures of the harness itself live here. A candidate that exits
//! non-zero, fails its tests, or times out is a successfully captured
//! outcome and is reported through `ExecutionResult`, never as an error.

use std::path::PathBuf;

/// Coarse classification of a [`HarnessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Io,
    Launch,
    Config,
}

/// Errors produced by the workspace store and the execution sandbox.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {}", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("path escapes workspace root: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),
}

impl HarnessError {
    /// Map an I/O failure on `path`, turning `ENOENT` into [`HarnessError::NotFound`].
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => HarnessError::NotFound { path },
            std::io::ErrorKind::InvalidData => HarnessError::InvalidUtf8 { path },
            _ => HarnessError::Io { path, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::NotFound { .. } => ErrorKind::NotFound,
            HarnessError::Io { .. }
            | HarnessError::InvalidUtf8 { .. }
            | HarnessError::InvalidPath { .. } => ErrorKind::Io,
            HarnessError::Launch { .. } => ErrorKind::Launch,
            HarnessError::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_not_found() {
        let err = HarnessError::from_io(
            "missing.py",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_from_io_maps_invalid_data_to_utf8() {
        let err = HarnessError::from_io(
            "binary.py",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8"),
        );
        assert!(matches!(err, HarnessError::InvalidUtf8 { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_permission_denied_is_io() {
        let err = HarnessError::from_io(
            "locked.py",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, HarnessError::Io { .. }));
        assert!(err.to_string().contains("locked.py"));
    }

    #[test]
    fn test_launch_kind() {
        let err = HarnessError::Launch {
            program: "flake8".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.kind(), ErrorKind::Launch);
        assert!(err.to_string().starts_with("failed to launch flake8"));
    }
}
