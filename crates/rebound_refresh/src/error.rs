//! Refresh error types

use std::path::PathBuf;

use rebound_animation::CompositorError;
use thiserror::Error;

/// Boxed error raised by a refresh operation
pub type OperationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Refresh-related errors
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The refresh was cancelled, usually because a newer one superseded it
    #[error("refresh cancelled")]
    Cancelled,

    /// Every deferral handed to an event handler was dropped without completing
    #[error("refresh deferral dropped without being completed")]
    DeferralAbandoned,

    /// The refresh operation failed for a reason other than cancellation
    #[error("refresh operation failed: {0}")]
    Operation(#[source] OperationError),

    /// The compositor rejected an animation request
    #[error(transparent)]
    Compositor(#[from] CompositorError),

    /// The configuration cannot drive the pull model
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Refresh and reset sequences need a tokio runtime to run on
    #[error("no tokio runtime is available to run the refresh")]
    RuntimeUnavailable,
}

impl RefreshError {
    /// Wrap an arbitrary operation failure
    pub fn operation<E>(error: E) -> Self
    where
        E: Into<OperationError>,
    {
        RefreshError::Operation(error.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RefreshError::Cancelled)
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for refresh operations
pub type Result<T> = std::result::Result<T, RefreshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_keeps_source() {
        let err = RefreshError::operation("backend unreachable");
        assert_eq!(
            err.to_string(),
            "refresh operation failed: backend unreachable"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_cancelled());
        assert!(RefreshError::Cancelled.is_cancelled());
    }
}
