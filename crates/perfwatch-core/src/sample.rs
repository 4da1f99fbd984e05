//! Process sampling seams and the per-request snapshot.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of resource usage for the hosting process.
pub trait ProcessSampler: Send + Sync {
    /// False when the host OS has no usable backend.
    fn is_supported(&self) -> bool;
    /// Virtual memory size in bytes.
    fn memory_bytes(&self) -> u64;
    /// CPU utilisation since the previous call, in percent.
    fn cpu_percent(&self) -> f32;
}

/// Answers whether a PID still denotes a running process.
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Wall clock in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Snapshot taken at request start, consumed once at response time.
///
/// Deliberately not `Clone`: a sample backs exactly one report row.
#[derive(Debug, PartialEq)]
pub struct RequestSample {
    pub memory_bytes: u64,
    pub cpu_load_percent: f32,
    pub captured_at_epoch_secs: f64,
    /// Activation generation the sample belongs to.
    pub(crate) generation: u64,
}

impl RequestSample {
    pub(crate) fn capture(sampler: &dyn ProcessSampler, clock: &dyn Clock, generation: u64) -> Self {
        Self {
            memory_bytes: sampler.memory_bytes(),
            cpu_load_percent: sampler.cpu_percent(),
            captured_at_epoch_secs: clock.now_epoch_secs(),
            generation,
        }
    }
}
