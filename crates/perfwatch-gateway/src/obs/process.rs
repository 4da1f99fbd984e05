//! `sysinfo`-backed process sampling.
//!
//! Memory and CPU are read from separate `System` instances: sysinfo derives
//! CPU usage from the interval between two refreshes of the same instance, so
//! a refresh for the memory reading in between would shrink that window to
//! nothing.

use parking_lot::Mutex;
use sysinfo::{Pid, System};

use perfwatch_core::{LivenessProbe, ProcessSampler};

pub struct SysinfoSampler {
    pid: Option<Pid>,
    memory: Mutex<System>,
    cpu: Mutex<System>,
}

impl SysinfoSampler {
    /// Sampler for the current process.
    pub fn current() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| tracing::warn!(error = %e, "cannot resolve own pid"))
            .ok();
        Self {
            pid,
            memory: Mutex::new(System::new()),
            cpu: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::current()
    }
}

impl ProcessSampler for SysinfoSampler {
    fn is_supported(&self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM && self.pid.is_some()
    }

    fn memory_bytes(&self) -> u64 {
        let Some(pid) = self.pid else { return 0 };
        let mut sys = self.memory.lock();
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.virtual_memory()).unwrap_or(0)
    }

    fn cpu_percent(&self) -> f32 {
        let Some(pid) = self.pid else { return 0.0 };
        let mut sys = self.cpu.lock();
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.cpu_usage()).unwrap_or(0.0)
    }
}

#[derive(Default)]
pub struct SysinfoLiveness {
    system: Mutex<System>,
}

impl LivenessProbe for SysinfoLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        let mut sys = self.system.lock();
        sys.refresh_process(Pid::from_u32(pid))
    }
}
