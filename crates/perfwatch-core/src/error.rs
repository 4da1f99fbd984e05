//! Shared error type across perfwatch crates.

use thiserror::Error;

/// Stable error categories (used as log field values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed configuration.
    InvalidConfig,
    /// Lock token missing a field or carrying garbage.
    InvalidToken,
    /// Filesystem failure.
    Io,
    /// Unsupported config version.
    UnsupportedVersion,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::InvalidToken => "INVALID_TOKEN",
            ErrorKind::Io => "IO",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PerfWatchError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum PerfWatchError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid lock token: {0}")]
    InvalidToken(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported config version")]
    UnsupportedVersion,
}

impl PerfWatchError {
    /// Map to a stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PerfWatchError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            PerfWatchError::InvalidToken(_) => ErrorKind::InvalidToken,
            PerfWatchError::Io(_) => ErrorKind::Io,
            PerfWatchError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
        }
    }
}
