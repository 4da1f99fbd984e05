//! Activation state machine tests driven by in-memory fakes.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use perfwatch_core::collector::CollectorDeps;
use perfwatch_core::error::Result;
use perfwatch_core::{
    Clock, LivenessProbe, LockToken, MetricsCollector, ProcessSampler, TokenStore,
};

#[derive(Default)]
struct MemoryTokens {
    raw: Mutex<Option<String>>,
    deletes: AtomicU64,
}

impl MemoryTokens {
    fn put(&self, raw: &str) {
        *self.raw.lock() = Some(raw.to_string());
    }
}

impl TokenStore for MemoryTokens {
    fn read(&self) -> Result<Option<LockToken>> {
        match self.raw.lock().as_deref() {
            None => Ok(None),
            Some(raw) => LockToken::parse(raw).map(Some),
        }
    }
    fn exists(&self) -> bool {
        self.raw.lock().is_some()
    }
    fn delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        *self.raw.lock() = None;
    }
    fn write(&self, token: &LockToken) -> Result<()> {
        self.put(&token.render());
        Ok(())
    }
}

struct FakeSampler {
    supported: bool,
    memory: AtomicU64,
}

impl ProcessSampler for FakeSampler {
    fn is_supported(&self) -> bool {
        self.supported
    }
    fn memory_bytes(&self) -> u64 {
        self.memory.fetch_add(4096, Ordering::Relaxed)
    }
    fn cpu_percent(&self) -> f32 {
        12.5
    }
}

struct FakeLiveness(AtomicBool);

impl LivenessProbe for FakeLiveness {
    fn is_alive(&self, _pid: u32) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct ManualClock(Mutex<f64>);

impl ManualClock {
    fn set(&self, t: f64) {
        *self.0.lock() = t;
    }
}

impl Clock for ManualClock {
    fn now_epoch_secs(&self) -> f64 {
        *self.0.lock()
    }
}

struct Rig {
    collector: MetricsCollector,
    tokens: Arc<MemoryTokens>,
    liveness: Arc<FakeLiveness>,
    clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

fn rig() -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let tokens = Arc::new(MemoryTokens::default());
    let liveness = Arc::new(FakeLiveness(AtomicBool::new(true)));
    let clock = Arc::new(ManualClock::default());
    let sampler = Arc::new(FakeSampler { supported: true, memory: AtomicU64::new(1 << 20) });
    let deps = CollectorDeps::new(sampler, liveness.clone(), tokens.clone()).with_clock(clock.clone());
    let collector = MetricsCollector::new(true, dir.path().join("performance"), deps).unwrap();
    Rig { collector, tokens, liveness, clock, _dir: dir }
}

fn csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

/// Run one request taking `secs` through the collector.
fn request(r: &Rig, path: &str, start: f64, secs: f64) -> Option<perfwatch_core::MetricsRow> {
    r.clock.set(start);
    let sample = r.collector.on_request();
    r.clock.set(start + secs);
    r.collector.on_response(path, sample)
}

#[test]
fn disabled_flag_or_unsupported_os_yields_no_collector() {
    let tokens = Arc::new(MemoryTokens::default());
    let liveness = Arc::new(FakeLiveness(AtomicBool::new(true)));

    let ok = Arc::new(FakeSampler { supported: true, memory: AtomicU64::new(0) });
    let deps = CollectorDeps::new(ok, liveness.clone(), tokens.clone());
    assert!(MetricsCollector::new(false, "perf", deps).is_none());

    let unsupported = Arc::new(FakeSampler { supported: false, memory: AtomicU64::new(0) });
    let deps = CollectorDeps::new(unsupported, liveness, tokens);
    assert!(MetricsCollector::new(true, "perf", deps).is_none());
}

#[test]
fn inactive_requests_produce_nothing() {
    let r = rig();
    for i in 0..5 {
        assert!(r.collector.on_request().is_none());
        assert!(request(&r, "/a", i as f64, 1.0).is_none());
    }
    assert!(!r.collector.is_active());
    assert!(!r.collector.performance_dir().exists());
}

#[test]
fn token_activates_with_pid_and_csv_path() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");

    assert!(r.collector.try_activate());
    let snap = r.collector.snapshot();
    assert!(snap.active);
    assert_eq!(snap.owner_pid, 4321);
    let csv = snap.csv_path.unwrap();
    assert!(csv.to_string_lossy().ends_with("20240101_000000_requests_performance.csv"));

    let lines = csv_lines(&csv);
    assert_eq!(
        lines,
        vec!["Date,Path,Duration,Memory before (Kb),Memory after (Kb),Load before (%),Load after(%),Longest time up to now"]
    );
}

#[test]
fn one_row_per_sampled_request() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    for i in 0..3 {
        let row = request(&r, &format!("/r/{i}"), 100.0 + i as f64, 0.5).unwrap();
        assert_eq!(row.path, format!("/r/{i}"));
        assert_eq!(row.load_before_percent, 12.5);
        assert!(row.memory_after_bytes > row.memory_before_bytes);
    }

    let csv = r.collector.snapshot().csv_path.unwrap();
    assert_eq!(csv_lines(&csv).len(), 4);
}

#[test]
fn activation_mid_flight_writes_no_row() {
    let r = rig();
    let sample = r.collector.on_request();
    assert!(sample.is_none());

    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.on_response("/late", sample).is_none());
    assert!(r.collector.is_active());

    let csv = r.collector.snapshot().csv_path.unwrap();
    assert_eq!(csv_lines(&csv).len(), 1);
}

#[test]
fn slowest_flag_marks_each_new_maximum() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    let durations = [0.5, 0.25, 1.0, 1.0, 0.75, 2.0];
    let flags: Vec<bool> = durations
        .iter()
        .enumerate()
        .map(|(i, d)| request(&r, "/x", 10.0 * i as f64, *d).unwrap().is_slowest_so_far)
        .collect();

    assert_eq!(flags, vec![true, false, true, false, false, true]);
    assert_eq!(r.collector.snapshot().slowest_duration_secs, 2.0);

    let csv = r.collector.snapshot().csv_path.unwrap();
    let last_col: Vec<String> = csv_lines(&csv)
        .iter()
        .skip(1)
        .map(|l| l.rsplit(',').next().unwrap().to_string())
        .collect();
    assert_eq!(last_col, vec!["True", "False", "True", "False", "False", "True"]);
}

#[test]
fn external_token_removal_deactivates_on_next_response() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());
    assert!(request(&r, "/a", 0.0, 0.1).is_some());

    *r.tokens.raw.lock() = None;
    let sample = r.collector.on_request();
    assert!(sample.is_some());
    // the in-flight row is still written, then the collector shuts down
    assert!(r.collector.on_response("/b", sample).is_some());

    let snap = r.collector.snapshot();
    assert!(!snap.active);
    assert_eq!(snap.owner_pid, 0);
    assert!(snap.csv_path.is_none());
    assert!(r.collector.on_request().is_none());
}

#[test]
fn dead_owner_deactivates_and_removes_token() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    r.liveness.0.store(false, Ordering::Relaxed);
    request(&r, "/a", 0.0, 0.1);

    assert!(!r.collector.is_active());
    assert!(!r.tokens.exists());
}

#[test]
fn non_integer_pid_keeps_inactive_and_removes_token() {
    let r = rig();
    r.tokens.put("not-a-pid\n20240101_000000\n");

    assert!(request(&r, "/a", 0.0, 0.1).is_none());
    assert!(!r.collector.is_active());
    assert!(!r.tokens.exists());
    assert_eq!(r.tokens.deletes.load(Ordering::Relaxed), 1);
}

#[test]
fn shutdown_is_idempotent() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    r.collector.shutdown();
    r.collector.shutdown();
    assert!(!r.collector.is_active());
    assert_eq!(r.collector.snapshot().owner_pid, 0);
}

#[test]
fn stale_sample_is_dropped_after_reactivation() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    r.clock.set(1.0);
    let stale = r.collector.on_request().unwrap();
    r.collector.shutdown();

    r.tokens.put("4321\n20240102_000000\n");
    r.clock.set(2.0);
    assert!(r.collector.on_response("/stale", Some(stale)).is_none());
    assert!(r.collector.is_active());

    let csv = r.collector.snapshot().csv_path.unwrap();
    assert!(csv.to_string_lossy().ends_with("20240102_000000_requests_performance.csv"));
    assert_eq!(csv_lines(&csv).len(), 1);
}

#[test]
fn slowest_resets_on_new_activation() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());
    request(&r, "/a", 0.0, 5.0);
    r.collector.shutdown();

    r.tokens.put("4321\n20240101_010000\n");
    assert!(r.collector.try_activate());
    assert_eq!(r.collector.snapshot().slowest_duration_secs, 0.0);
    assert!(request(&r, "/b", 10.0, 1.0).unwrap().is_slowest_so_far);
}

#[test]
fn concurrent_responses_keep_rows_whole() {
    let r = Arc::new(rig());
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let r = Arc::clone(&r);
            std::thread::spawn(move || {
                for i in 0..25 {
                    let sample = r.collector.on_request();
                    r.collector.on_response(&format!("/t{t}/{i}"), sample);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let csv = r.collector.snapshot().csv_path.unwrap();
    let lines = csv_lines(&csv);
    assert_eq!(lines.len(), 1 + 8 * 25);
    assert!(lines.iter().skip(1).all(|l| l.split(',').count() == 8));
}

#[test]
fn failed_append_does_not_raise_slowest() {
    let r = rig();
    r.tokens.put("4321\n20240101_000000\n");
    assert!(r.collector.try_activate());
    assert!(request(&r, "/a", 0.0, 1.0).unwrap().is_slowest_so_far);

    let perf_dir = r.collector.performance_dir().to_path_buf();
    fs::remove_dir_all(&perf_dir).unwrap();
    assert!(request(&r, "/b", 10.0, 5.0).is_none());
    assert!(r.collector.is_active());
    assert_eq!(r.collector.snapshot().slowest_duration_secs, 1.0);

    fs::create_dir_all(&perf_dir).unwrap();
    let row = request(&r, "/c", 20.0, 3.0).unwrap();
    assert!(row.is_slowest_so_far);
    assert_eq!(r.collector.snapshot().slowest_duration_secs, 3.0);
}

#[test]
fn unreadable_lock_path_keeps_inactive() {
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("server_profile.lock");
    fs::create_dir(&lock_path).unwrap();

    let tokens = Arc::new(perfwatch_core::FileTokenStore::new(&lock_path));
    assert!(tokens.read().is_err());

    let sampler = Arc::new(FakeSampler { supported: true, memory: AtomicU64::new(0) });
    let liveness = Arc::new(FakeLiveness(AtomicBool::new(true)));
    let deps = CollectorDeps::new(sampler, liveness, tokens);
    let collector = MetricsCollector::new(true, dir.path().join("performance"), deps).unwrap();

    for _ in 0..3 {
        let sample = collector.on_request();
        assert!(sample.is_none());
        assert!(collector.on_response("/a", sample).is_none());
    }
    assert!(!collector.try_activate());
    assert!(!dir.path().join("performance").exists());
    // a directory is not removed by the best-effort delete
    assert!(lock_path.is_dir());
}
