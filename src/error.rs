//! WolfSync Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for WolfSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfSync error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("No directories to sync")]
    NoDirectories,

    #[error("Invalid worker limit {0}: must be greater than zero")]
    InvalidWorkerLimit(usize),

    // Topology errors
    #[error(
        "Cannot sync a parent directory with a child directory: {} contains {}",
        .root.display(),
        .other.display()
    )]
    Topology { root: PathBuf, other: PathBuf },

    #[error("Directory listed more than once: {}", .0.display())]
    DuplicateRoot(PathBuf),

    // Per-event I/O errors
    #[error("Transient I/O error on {}: {source}", .path.display())]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path collision: {} is a directory", .0.display())]
    PathCollision(PathBuf),

    #[error("Invalid change event: {0}")]
    InvalidEvent(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn transient(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::TransientIo {
            path: path.into(),
            source,
        }
    }

    /// Check if this error only affects a single event
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientIo { .. } | Error::PathCollision(_) | Error::InvalidEvent(_)
        )
    }

    /// Check if this error is a fatal startup configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigParse(_)
                | Error::NoDirectories
                | Error::InvalidWorkerLimit(_)
                | Error::Topology { .. }
                | Error::DuplicateRoot(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::transient("/tmp/a", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_transient());
        assert!(!err.is_configuration());

        let err = Error::Topology {
            root: PathBuf::from("/data"),
            other: PathBuf::from("/data/sub"),
        };
        assert!(err.is_configuration());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("/data/sub"));
    }
}
