//! Shared retry/backoff policy (spec §4.7, §9): one place for
//! exponential-backoff-with-full-jitter, used by the LLM client and any
//! other transient I/O rather than scattering ad-hoc retry loops.

use std::time::Duration;

use rand::Rng;

/// Whether a failure is worth retrying. Throttling, 5xx, and network
/// errors are retryable; 4xx (other than throttling) are terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_s: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs_f64(base_delay_s),
            cap: Duration::from_secs_f64(6.0),
        }
    }

    /// Backoff delay before attempt `n` (0-indexed retry count), full
    /// jitter: `dₙ = min(cap, d₀·2ⁿ) · rand(0.5, 1.0)`.
    pub fn backoff_for_attempt(&self, n: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(n as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped * jitter)
    }

    /// Runs `op`, retrying on retryable errors up to `max_attempts` total
    /// attempts, sleeping `sleep` between attempts (injected so tests can
    /// run without wall-clock delay).
    pub fn run_with<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: Retryable,
        S: FnMut(Duration),
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !e.is_retryable() {
                        return Err(e);
                    }
                    sleep(self.backoff_for_attempt(attempt - 1));
                }
            }
        }
    }
}
