//! Shared application state for the perfwatch gateway.
//!
//! Holds the loaded config, the compiled access-log rules and, when profiling
//! is enabled and supported, the process-wide metrics collector. Startup
//! errors surface as `Result` instead of panicking.

use std::sync::Arc;

use perfwatch_core::collector::CollectorDeps;
use perfwatch_core::error::Result;
use perfwatch_core::{FileTokenStore, LivenessProbe, MetricsCollector, ProcessSampler};

use crate::config::GatewayConfig;
use crate::obs::access_log::AccessLogRules;
use crate::obs::process::{SysinfoLiveness, SysinfoSampler};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    access_rules: Arc<AccessLogRules>,
    collector: Option<Arc<MetricsCollector>>,
}

impl AppState {
    /// Build application state with the `sysinfo` backends.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        Self::with_backends(
            cfg,
            Arc::new(SysinfoSampler::current()),
            Arc::new(SysinfoLiveness::default()),
        )
    }

    /// Same as `new` with injected process backends.
    pub fn with_backends(
        cfg: GatewayConfig,
        sampler: Arc<dyn ProcessSampler>,
        liveness: Arc<dyn LivenessProbe>,
    ) -> Result<Self> {
        cfg.validate()?;

        let access_rules = Arc::new(AccessLogRules::from_config(&cfg.access_log));

        let tokens = Arc::new(FileTokenStore::new(cfg.profiling.lock_file.clone()));
        let deps = CollectorDeps::new(sampler, liveness, tokens);
        let collector = MetricsCollector::new(
            cfg.profiling.enabled,
            cfg.profiling.performance_dir.clone(),
            deps,
        )
        .map(Arc::new);

        if collector.is_some() {
            tracing::info!(
                lock_file = %cfg.profiling.lock_file.display(),
                performance_dir = %cfg.profiling.performance_dir.display(),
                "request profiling armed, waiting for lock token"
            );
        }

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, access_rules, collector }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn access_rules(&self) -> Arc<AccessLogRules> {
        Arc::clone(&self.inner.access_rules)
    }

    /// `None` when profiling is disabled or unsupported on this OS.
    pub fn collector(&self) -> Option<Arc<MetricsCollector>> {
        self.inner.collector.clone()
    }
}
