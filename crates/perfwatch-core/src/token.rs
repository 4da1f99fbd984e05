//! Lock token: the file-backed activation signal.
//!
//! Format (two lines):
//! ```text
//! 4321
//! 20240101_000000
//! ```
//! Line 1 is the controller PID, line 2 the activation timestamp
//! (`YYYYMMDD_HHMMSS`). Presence requests activation, removal requests
//! deactivation.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PerfWatchError, Result};

/// Timestamp layout for line 2 (chrono strftime syntax).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Parsed lock token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub pid: u32,
    pub activation_timestamp: String,
}

impl LockToken {
    pub fn new(pid: u32, activation_timestamp: impl Into<String>) -> Self {
        Self { pid, activation_timestamp: activation_timestamp.into() }
    }

    /// Token for the calling process, stamped with the current local time.
    pub fn for_current_process() -> Self {
        let ts = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::new(std::process::id(), ts)
    }

    /// Parse the two-line token format.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let pid_line = lines
            .next()
            .ok_or_else(|| PerfWatchError::InvalidToken("empty token".into()))?;
        let pid: u32 = pid_line.trim().parse().map_err(|_| {
            PerfWatchError::InvalidToken(format!("pid is not an integer: {pid_line:?}"))
        })?;

        let ts = lines.next().map(str::trim).unwrap_or_default();
        if ts.is_empty() {
            return Err(PerfWatchError::InvalidToken("missing activation timestamp".into()));
        }
        // The timestamp ends up in a file name.
        if ts.contains(['/', '\\']) || ts.contains("..") {
            return Err(PerfWatchError::InvalidToken(format!("bad activation timestamp: {ts:?}")));
        }

        Ok(Self::new(pid, ts))
    }

    pub fn render(&self) -> String {
        format!("{}\n{}\n", self.pid, self.activation_timestamp)
    }
}

/// Narrow access to the activation signal, so the collector can be driven by
/// an in-memory fake in tests.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when absent, `Err` when present but unreadable or malformed.
    fn read(&self) -> Result<Option<LockToken>>;
    fn exists(&self) -> bool;
    /// Best-effort removal. Already-deleted is not an error.
    fn delete(&self);
    /// Used by controllers to request activation.
    fn write(&self, token: &LockToken) -> Result<()>;
}

/// Token stored at a fixed path on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Result<Option<LockToken>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => LockToken::parse(&raw).map(Some),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn delete(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "lock token removed"),
            // another process got there first
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "lock token removal failed");
            }
        }
    }

    fn write(&self, token: &LockToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, token.render())?;
        Ok(())
    }
}
