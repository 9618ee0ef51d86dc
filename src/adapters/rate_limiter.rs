//! Minimum-spacing gate for outbound API calls.
//!
//! One instance is shared (behind an `Arc`) by every market-data call in the
//! process. The last admitted call time lives in an atomic; callers sleep until
//! the interval has elapsed and then race to claim the slot with a
//! compare-and-swap. A caller that loses the race re-reads the new slot and
//! waits again, so no two admitted calls are ever closer than `interval`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const NEVER: u64 = 0;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    origin: Instant,
    /// Nanoseconds since `origin` of the last admitted call, plus one; `NEVER` if none.
    last_call: AtomicU64,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            origin: Instant::now(),
            last_call: AtomicU64::new(NEVER),
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until a call may start, records it, and returns its start time.
    pub fn acquire(&self) -> Instant {
        let interval = saturating_nanos(self.interval);

        loop {
            let last = self.last_call.load(Ordering::Acquire);
            let now = self.stamp();

            if last != NEVER {
                let earliest = last.saturating_add(interval);
                if now < earliest {
                    thread::sleep(Duration::from_nanos(earliest - now));
                    continue;
                }
            }

            if self
                .last_call
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return self.origin + Duration::from_nanos(now - 1);
            }
        }
    }

    fn stamp(&self) -> u64 {
        saturating_nanos(self.origin.elapsed()).saturating_add(1)
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn oversized_intervals_saturate() {
        assert_eq!(saturating_nanos(Duration::from_millis(3)), 3_000_000);
        assert_eq!(saturating_nanos(Duration::MAX), u64::MAX);
        assert_eq!(saturating_nanos(Duration::from_secs(u64::MAX / 1_000)), u64::MAX);
    }

    #[test]
    fn huge_interval_still_admits_the_first_call() {
        let limiter = RateLimiter::new(Duration::MAX);
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(250));
        assert_eq!(limiter.interval(), Duration::MAX);
    }

    #[test]
    fn first_call_is_immediate() {
        let limiter = RateLimiter::from_millis(500);
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn sequential_calls_are_spaced() {
        let limiter = RateLimiter::from_millis(40);
        let start = Instant::now();
        let stamps: Vec<Instant> = (0..4).map(|_| limiter.acquire()).collect();

        assert!(start.elapsed() >= Duration::from_millis(120));
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
        }
    }

    #[test]
    fn concurrent_callers_never_bypass_interval() {
        let interval = Duration::from_millis(30);
        let limiter = Arc::new(RateLimiter::new(interval));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let stamps = Arc::clone(&stamps);
                thread::spawn(move || {
                    for _ in 0..3 {
                        let t = limiter.acquire();
                        stamps.lock().push(t);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut stamps = stamps.lock().clone();
        assert_eq!(stamps.len(), 12);
        assert!(start.elapsed() >= interval * 11);

        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }
}
