//! Profiling controller (`perfwatch-gateway profile`).
//!
//! Writes the lock token with this process's PID, keeps it for the requested
//! time, then removes it. A running gateway activates on the next response
//! after the token appears and deactivates once the token or this process is
//! gone.

use std::fs;
use std::time::Duration;

use perfwatch_core::error::{PerfWatchError, Result};
use perfwatch_core::report::report_path;
use perfwatch_core::{FileTokenStore, LockToken, TokenStore};

use crate::config::ProfilingSection;

/// Create the lock token. Fails if another session already holds it.
pub fn start_session(cfg: &ProfilingSection) -> Result<(FileTokenStore, LockToken)> {
    let store = FileTokenStore::new(cfg.lock_file.clone());
    if store.exists() {
        return Err(PerfWatchError::InvalidToken(format!(
            "profiling session already running (lock file {} exists)",
            cfg.lock_file.display()
        )));
    }

    fs::create_dir_all(&cfg.performance_dir)?;
    let token = LockToken::for_current_process();
    store.write(&token)?;

    tracing::info!(
        pid = token.pid,
        csv = %report_path(&cfg.performance_dir, &token.activation_timestamp).display(),
        "profiling session started"
    );
    Ok((store, token))
}

pub async fn run_profile(cfg: &ProfilingSection, seconds: u64) -> Result<()> {
    let (store, _token) = start_session(cfg)?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("profiling interrupted");
        }
    }

    store.delete();
    tracing::info!("profiling session finished");
    Ok(())
}
