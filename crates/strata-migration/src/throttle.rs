//! Token-bucket throttle (§4.11): bounds the byte rate the migration worker
//! pool draws from disk/network so a migration run doesn't starve normal
//! traffic. One `parking_lot::Mutex` guards the whole state, matching §5's
//! "each long-lived structure owns exactly one lock" (`throttle.lock`).

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Sleeps longer than this are cut short and re-evaluated, so a caller
/// spinning on `wait` can still observe a concurrent `set_rate`/`disable`
/// within 100ms instead of oversleeping against a rate that just changed.
const MAX_SLEEP: Duration = Duration::from_millis(100);

struct State {
    rate_bytes_per_sec: u64,
    burst_bytes: u64,
    tokens: f64,
    last_refill: Instant,
    enabled: bool,
}

/// A token bucket: `tokens` refill continuously at `rate_bytes_per_sec`,
/// capped at `burst_bytes`. `wait(bytes)` blocks the calling thread until
/// enough tokens are available, sleeping in capped increments so it stays
/// interruptible by a concurrent `set_rate`.
pub struct Throttle {
    state: Mutex<State>,
}

impl Throttle {
    #[must_use]
    pub fn new(rate_bytes_per_sec: u64, burst_bytes: u64) -> Self {
        Self {
            state: Mutex::new(State {
                rate_bytes_per_sec,
                burst_bytes,
                tokens: burst_bytes as f64,
                last_refill: Instant::now(),
                enabled: rate_bytes_per_sec > 0,
            }),
        }
    }

    /// A throttle with rate 0 is disabled outright: `wait` always returns
    /// immediately (§4.11 "`set_rate(0)` disables").
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    fn refill(state: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        let refilled = state.tokens + elapsed * state.rate_bytes_per_sec as f64;
        state.tokens = refilled.min(state.burst_bytes as f64);
    }

    /// Block the calling thread until `bytes` worth of tokens are
    /// available, or return immediately if disabled or `bytes == 0`.
    pub fn wait(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        loop {
            let sleep_for = {
                let mut state = self.state.lock();
                if !state.enabled {
                    return;
                }
                Self::refill(&mut state);
                if state.tokens >= bytes as f64 {
                    state.tokens -= bytes as f64;
                    return;
                }
                let remaining = bytes as f64 - state.tokens;
                let secs = remaining / state.rate_bytes_per_sec as f64;
                Duration::from_secs_f64(secs).min(MAX_SLEEP)
            };
            std::thread::sleep(sleep_for);
        }
    }

    /// Change the rate; `0` disables the throttle entirely. Serialized by
    /// the same lock `wait` refills under (§4.11).
    pub fn set_rate(&self, rate_bytes_per_sec: u64) {
        let mut state = self.state.lock();
        Self::refill(&mut state);
        state.rate_bytes_per_sec = rate_bytes_per_sec;
        state.enabled = rate_bytes_per_sec > 0;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_throttle_never_blocks() {
        let throttle = Throttle::disabled();
        let start = Instant::now();
        throttle.wait(10 * 1024 * 1024);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_zero_bytes_never_blocks() {
        let throttle = Throttle::new(1, 1);
        let start = Instant::now();
        throttle.wait(0);
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_burst_is_consumed_immediately() {
        // 10 Mbps, 1 MiB burst: the first 1 MiB should not block at all.
        let throttle = Throttle::new(10 * 1024 * 1024, 1024 * 1024);
        let start = Instant::now();
        throttle.wait(1024 * 1024);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_second_burst_waits_for_refill() {
        let throttle = Throttle::new(10 * 1024 * 1024, 1024 * 1024);
        throttle.wait(1024 * 1024);
        let start = Instant::now();
        throttle.wait(1024 * 1024);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(90), "elapsed too short: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(250), "elapsed too long: {elapsed:?}");
    }

    #[test]
    fn test_set_rate_zero_disables() {
        let throttle = Throttle::new(1024, 1024);
        throttle.set_rate(0);
        assert!(!throttle.is_enabled());
        let start = Instant::now();
        throttle.wait(1_000_000);
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
