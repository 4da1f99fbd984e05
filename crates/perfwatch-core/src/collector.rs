//! Request metrics collector.
//!
//! Lifecycle:
//! - construction: `MetricsCollector::new` returns `None` when profiling is
//!   disabled in config or the sampling backend does not support this OS.
//!   That decision is permanent for the process.
//! - inactive: every response re-reads the lock token. A valid token activates
//!   the collector and writes the CSV header; a corrupt one is removed.
//! - active: request start captures a `RequestSample`, response appends one
//!   row. After each response the owner PID and the token are re-checked and
//!   the collector shuts itself down when either is gone.
//!
//! All transitions and report appends run under one mutex, so two responses
//! can never both activate or interleave partial rows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::report::{report_path, CsvReport, MetricsRow, ROW_TIMESTAMP_FORMAT};
use crate::sample::{Clock, LivenessProbe, ProcessSampler, RequestSample, SystemClock};
use crate::token::TokenStore;

/// External collaborators of the collector.
#[derive(Clone)]
pub struct CollectorDeps {
    pub sampler: Arc<dyn ProcessSampler>,
    pub liveness: Arc<dyn LivenessProbe>,
    pub tokens: Arc<dyn TokenStore>,
    pub clock: Arc<dyn Clock>,
}

impl CollectorDeps {
    pub fn new(
        sampler: Arc<dyn ProcessSampler>,
        liveness: Arc<dyn LivenessProbe>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self { sampler, liveness, tokens, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Default)]
struct ActivationState {
    active: bool,
    owner_pid: u32,
    slowest_duration_secs: f64,
    report: Option<CsvReport>,
    /// Bumped on every activation; samples from older generations are stale.
    generation: u64,
}

/// Point-in-time view for status endpoints and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSnapshot {
    pub active: bool,
    pub owner_pid: u32,
    pub slowest_duration_secs: f64,
    pub csv_path: Option<PathBuf>,
}

pub struct MetricsCollector {
    performance_dir: PathBuf,
    deps: CollectorDeps,
    state: Mutex<ActivationState>,
}

impl MetricsCollector {
    /// Returns `None` when the collector must stay out of the request path.
    pub fn new(
        profiling_enabled: bool,
        performance_dir: impl Into<PathBuf>,
        deps: CollectorDeps,
    ) -> Option<Self> {
        if !profiling_enabled {
            tracing::info!("request profiling is not enabled");
            return None;
        }
        if !deps.sampler.is_supported() {
            tracing::info!("request profiling unavailable: no process sampling backend for this OS");
            return None;
        }
        Some(Self {
            performance_dir: performance_dir.into(),
            deps,
            state: Mutex::new(ActivationState::default()),
        })
    }

    pub fn performance_dir(&self) -> &Path {
        &self.performance_dir
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        let st = self.state.lock();
        CollectorSnapshot {
            active: st.active,
            owner_pid: st.owner_pid,
            slowest_duration_secs: st.slowest_duration_secs,
            csv_path: st.report.as_ref().map(|r| r.path().to_path_buf()),
        }
    }

    /// Request-start hook. No-op while inactive.
    pub fn on_request(&self) -> Option<RequestSample> {
        let generation = {
            let st = self.state.lock();
            if !st.active {
                return None;
            }
            st.generation
        };
        Some(RequestSample::capture(
            self.deps.sampler.as_ref(),
            self.deps.clock.as_ref(),
            generation,
        ))
    }

    /// Response hook: activation check, row append, shutdown check.
    ///
    /// Returns the row that was written, if any.
    pub fn on_response(&self, path: &str, sample: Option<RequestSample>) -> Option<MetricsRow> {
        let mut st = self.state.lock();

        if !st.active {
            self.try_activate_locked(&mut st);
        }
        if !st.active {
            return None;
        }

        let row = sample.and_then(|s| self.record_locked(&mut st, path, s));

        if !self.deps.liveness.is_alive(st.owner_pid) || !self.deps.tokens.exists() {
            self.shutdown_locked(&mut st);
        }
        row
    }

    /// Evaluate the lock token now. Returns whether the collector is active.
    pub fn try_activate(&self) -> bool {
        let mut st = self.state.lock();
        if !st.active {
            self.try_activate_locked(&mut st);
        }
        st.active
    }

    /// Turn a sample into a report row without the activation/shutdown checks.
    pub fn record_request(&self, path: &str, sample: RequestSample) -> Option<MetricsRow> {
        let mut st = self.state.lock();
        if !st.active {
            return None;
        }
        self.record_locked(&mut st, path, sample)
    }

    /// Deactivate and drop the lock token. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut st = self.state.lock();
        self.shutdown_locked(&mut st);
    }

    fn try_activate_locked(&self, st: &mut ActivationState) {
        let token = match self.deps.tokens.read() {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(kind = e.kind().as_str(), error = %e, "discarding unusable lock token");
                self.deps.tokens.delete();
                return;
            }
        };

        let report = CsvReport::new(report_path(&self.performance_dir, &token.activation_timestamp));
        if let Err(e) = report.write_header() {
            tracing::warn!(
                kind = e.kind().as_str(),
                error = %e,
                csv = %report.path().display(),
                "cannot write profiling report header"
            );
            return;
        }

        tracing::info!(
            owner_pid = token.pid,
            csv = %report.path().display(),
            "request profiling activated"
        );
        st.active = true;
        st.owner_pid = token.pid;
        st.slowest_duration_secs = 0.0;
        st.report = Some(report);
        st.generation += 1;
    }

    fn record_locked(
        &self,
        st: &mut ActivationState,
        path: &str,
        sample: RequestSample,
    ) -> Option<MetricsRow> {
        if sample.generation != st.generation {
            tracing::debug!(path, "dropping sample from a previous activation");
            return None;
        }

        let duration = (self.deps.clock.now_epoch_secs() - sample.captured_at_epoch_secs).max(0.0);
        let memory_after = self.deps.sampler.memory_bytes();
        let load_after = self.deps.sampler.cpu_percent();

        let is_slowest = duration > st.slowest_duration_secs;

        let row = MetricsRow {
            timestamp: chrono::Local::now().format(ROW_TIMESTAMP_FORMAT).to_string(),
            path: path.to_string(),
            duration_secs: duration,
            memory_before_bytes: sample.memory_bytes,
            memory_after_bytes: memory_after,
            load_before_percent: sample.cpu_load_percent,
            load_after_percent: load_after,
            is_slowest_so_far: is_slowest,
        };

        let report = st.report.as_ref()?;
        match report.append(&row) {
            Ok(()) => {
                // only a written row may set the running maximum
                if is_slowest {
                    st.slowest_duration_secs = duration;
                }
                Some(row)
            }
            Err(e) => {
                tracing::warn!(
                    kind = e.kind().as_str(),
                    error = %e,
                    csv = %report.path().display(),
                    "cannot append profiling row"
                );
                None
            }
        }
    }

    fn shutdown_locked(&self, st: &mut ActivationState) {
        if st.active {
            tracing::info!(
                owner_pid = st.owner_pid,
                slowest_secs = st.slowest_duration_secs,
                "request profiling deactivated"
            );
        }
        st.active = false;
        st.owner_pid = 0;
        st.report = None;
        self.deps.tokens.delete();
    }
}
