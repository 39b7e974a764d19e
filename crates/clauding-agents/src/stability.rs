//! Output-file stability detection.
//!
//! Captured terminals give no reliable "finished flushing" signal, so the
//! transcript is considered complete once its size stops changing.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use clauding_core::config::StabilityConfig;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityOptions {
    pub max_wait: Duration,
    pub interval: Duration,
    pub required_stable_checks: u32,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2_000),
            interval: Duration::from_millis(50),
            required_stable_checks: 3,
        }
    }
}

impl From<&StabilityConfig> for StabilityOptions {
    fn from(config: &StabilityConfig) -> Self {
        Self {
            max_wait: config.max_wait(),
            interval: config.interval(),
            required_stable_checks: config.required_stable_checks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityOutcome {
    /// Nothing to wait for.
    Missing,
    Stable { size: u64, elapsed: Duration },
    /// Gave up waiting; callers proceed anyway.
    TimedOut { size: u64 },
}

/// Block until `path` keeps the same size for `required_stable_checks`
/// consecutive polls, or `max_wait` elapses.
pub fn await_stability(path: &Path, options: StabilityOptions) -> StabilityOutcome {
    let Some(mut last_size) = file_size(path) else {
        return StabilityOutcome::Missing;
    };

    let started = Instant::now();
    let deadline = started + options.max_wait;
    let mut stable_checks = 0u32;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return StabilityOutcome::TimedOut { size: last_size };
        }
        thread::sleep(options.interval.min(deadline - now));

        // A file deleted mid-wait counts as size 0 rather than aborting.
        let size = file_size(path).unwrap_or(0);
        if size == last_size {
            stable_checks += 1;
            if stable_checks >= options.required_stable_checks {
                let elapsed = started.elapsed();
                debug!(path = %path.display(), size, ?elapsed, "output file stable");
                return StabilityOutcome::Stable { size, elapsed };
            }
        } else {
            stable_checks = 0;
            last_size = size;
        }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|meta| meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn options(max_wait_ms: u64, interval_ms: u64, checks: u32) -> StabilityOptions {
        StabilityOptions {
            max_wait: Duration::from_millis(max_wait_ms),
            interval: Duration::from_millis(interval_ms),
            required_stable_checks: checks,
        }
    }

    #[test]
    fn missing_file_returns_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        let started = Instant::now();
        let outcome = await_stability(&dir.path().join("absent.txt"), options(2_000, 50, 3));

        assert_eq!(outcome, StabilityOutcome::Missing);
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn untouched_file_is_stable_after_required_checks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        fs::write(&path, "x".repeat(32 * 1024)).unwrap();

        let started = Instant::now();
        let outcome = await_stability(&path, options(2_000, 50, 3));
        let elapsed = started.elapsed();

        assert!(matches!(outcome, StabilityOutcome::Stable { size, .. } if size == 32 * 1024));
        assert!(elapsed >= Duration::from_millis(150), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_000), "returned late: {elapsed:?}");
    }

    #[test]
    fn continuously_growing_file_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("growing.txt");
        fs::write(&path, "start\n").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let path = path.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
                while !stop.load(Ordering::Relaxed) {
                    file.write_all(b"more output\n").unwrap();
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };

        let started = Instant::now();
        let outcome = await_stability(&path, options(300, 20, 3));
        let elapsed = started.elapsed();
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        assert!(matches!(outcome, StabilityOutcome::TimedOut { .. }));
        assert!(elapsed >= Duration::from_millis(300));
    }

    #[test]
    fn options_follow_config() {
        let config = StabilityConfig {
            max_wait_ms: 900,
            interval_ms: 30,
            required_stable_checks: 5,
            settle_delay_ms: 0,
        };
        let options = StabilityOptions::from(&config);
        assert_eq!(options.max_wait, Duration::from_millis(900));
        assert_eq!(options.interval, Duration::from_millis(30));
        assert_eq!(options.required_stable_checks, 5);
        assert_eq!(StabilityOptions::default(), StabilityOptions::from(&StabilityConfig::default()));
    }
}
