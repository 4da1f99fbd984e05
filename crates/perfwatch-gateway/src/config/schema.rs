use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::Method;
use serde::Deserialize;
use perfwatch_core::error::{PerfWatchError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub profiling: ProfilingSection,

    #[serde(default)]
    pub access_log: AccessLogSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PerfWatchError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.profiling.validate()?;
        self.access_log.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            PerfWatchError::InvalidConfig(format!(
                "gateway.listen must be a valid socket address: {}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

/// Request profiling. `enabled` is read once, when the collector is built.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilingSection {
    #[serde(default)]
    pub enabled: bool,

    /// Activation signal written by `perfwatch-gateway profile`.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Where `<timestamp>_requests_performance.csv` files land.
    #[serde(default = "default_performance_dir")]
    pub performance_dir: PathBuf,
}

impl Default for ProfilingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            lock_file: default_lock_file(),
            performance_dir: default_performance_dir(),
        }
    }
}

impl ProfilingSection {
    pub fn validate(&self) -> Result<()> {
        if self.lock_file.as_os_str().is_empty() {
            return Err(PerfWatchError::InvalidConfig(
                "profiling.lock_file must not be empty".into(),
            ));
        }
        if self.performance_dir.as_os_str().is_empty() {
            return Err(PerfWatchError::InvalidConfig(
                "profiling.performance_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_lock_file() -> PathBuf {
    "server_profile.lock".into()
}
fn default_performance_dir() -> PathBuf {
    "performance".into()
}

/// Requests matching any of these rules are access-logged at debug level.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessLogSection {
    /// Busy polling endpoints (substring match).
    #[serde(default = "default_debug_path_fragments")]
    pub debug_path_fragments: Vec<String>,

    #[serde(default = "default_debug_exact_paths")]
    pub debug_exact_paths: Vec<String>,

    #[serde(default = "default_debug_methods")]
    pub debug_methods: Vec<String>,
}

impl Default for AccessLogSection {
    fn default() -> Self {
        Self {
            debug_path_fragments: default_debug_path_fragments(),
            debug_exact_paths: default_debug_exact_paths(),
            debug_methods: default_debug_methods(),
        }
    }
}

impl AccessLogSection {
    pub fn validate(&self) -> Result<()> {
        if self.debug_path_fragments.iter().any(String::is_empty) {
            return Err(PerfWatchError::InvalidConfig(
                "access_log.debug_path_fragments entries must not be empty".into(),
            ));
        }
        for m in &self.debug_methods {
            Method::from_bytes(m.as_bytes()).map_err(|_| {
                PerfWatchError::InvalidConfig(format!("access_log.debug_methods: invalid method {m}"))
            })?;
        }
        Ok(())
    }
}

fn default_debug_path_fragments() -> Vec<String> {
    vec!["/api/tasks/tasks/".into()]
}
fn default_debug_exact_paths() -> Vec<String> {
    vec!["/status/".into()]
}
fn default_debug_methods() -> Vec<String> {
    vec!["PATCH".into()]
}
