//! Error types for conftrack.
//!
//! Library crates use [`ConfTrackError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all conftrack operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfTrackError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during page fetch or search.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed collaborator output (feed, listing page, JSON reply).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Lookup cache error.
    #[error("storage error: {0}")]
    Storage(String),

    /// AI-agent process error (spawn, timeout, exit status).
    #[error("agent error: {0}")]
    Agent(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (implausible value, invalid record).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-text conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ConfTrackError>;

impl ConfTrackError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from an external collaborator and should
    /// degrade to "no data" instead of aborting a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Parse { .. } | Self::Agent(_) | Self::Conversion(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ConfTrackError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ConfTrackError::validation("year 2091 outside plausible window");
        assert!(err.to_string().contains("2091"));
    }

    #[test]
    fn collaborator_errors_are_recoverable() {
        assert!(ConfTrackError::Network("timeout".into()).is_recoverable());
        assert!(ConfTrackError::parse("bad json").is_recoverable());
        assert!(ConfTrackError::Agent("exit 1".into()).is_recoverable());
        let io = ConfTrackError::io(
            "conferences.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!io.is_recoverable());
    }
}
