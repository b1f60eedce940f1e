//! Retries with exponential backoff, and a per-platform circuit breaker so a
//! platform that keeps failing stops eating the run's time budget.

use painminer_core::{CoreError, ErrorExt, Platform, SourceError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Extra random delay as a fraction of the backoff, 0.0 to 1.0.
    pub jitter_factor: f64,
    /// Consecutive failed requests before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before letting one probe through.
    pub recovery_timeout_s: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            failure_threshold: 5,
            recovery_timeout_s: 60,
        }
    }
}

impl RetryConfig {
    /// Anonymous Reddit access is throttled hard; back off longer.
    pub fn reddit() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            jitter_factor: 0.2,
            failure_threshold: 3,
            recovery_timeout_s: 120,
            ..Self::default()
        }
    }

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Reddit => Self::reddit(),
            _ => Self::default(),
        }
    }

    /// Exponential backoff with additive jitter, capped at `max_delay_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let base = (scaled as u64).min(self.max_delay_ms);
        let jitter_range = (base as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter = fastrand::u64(0..=jitter_range);
        Duration::from_millis((base + jitter).min(self.max_delay_ms))
    }

    /// Delay before retrying after `error`, or `None` when it should not be retried.
    /// A server-supplied wait wins over backoff.
    pub fn delay_for(&self, error: &CoreError, attempt: u32) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }
        match error {
            CoreError::Source(SourceError::RateLimitExceeded { retry_after, .. }) => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => Some(self.backoff(attempt)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Closed { failures: u32 },
    Open { since: Instant },
    /// One probe request is allowed through to test recovery.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    circuit: Circuit,
    failure_threshold: u32,
    recovery: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            circuit: Circuit::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            recovery: Duration::from_secs(config.recovery_timeout_s),
        }
    }

    pub fn circuit(&self) -> Circuit {
        self.circuit
    }

    pub fn is_open(&self) -> bool {
        matches!(self.circuit, Circuit::Open { .. })
    }

    pub fn allow_request(&mut self) -> bool {
        match self.circuit {
            Circuit::Closed { .. } | Circuit::HalfOpen => true,
            Circuit::Open { since } if since.elapsed() >= self.recovery => {
                debug!("Circuit half-open, letting a probe through");
                self.circuit = Circuit::HalfOpen;
                true
            }
            Circuit::Open { .. } => false,
        }
    }

    pub fn record_success(&mut self) {
        if self.circuit == Circuit::HalfOpen {
            info!("Probe succeeded, circuit closed again");
        }
        self.circuit = Circuit::Closed { failures: 0 };
    }

    pub fn record_failure(&mut self) {
        self.circuit = match self.circuit {
            Circuit::Closed { failures } if failures + 1 >= self.failure_threshold => {
                warn!("Circuit opening after {} consecutive failures", failures + 1);
                Circuit::Open {
                    since: Instant::now(),
                }
            }
            Circuit::Closed { failures } => Circuit::Closed {
                failures: failures + 1,
            },
            Circuit::HalfOpen => {
                warn!("Probe failed, circuit open again");
                Circuit::Open {
                    since: Instant::now(),
                }
            }
            open @ Circuit::Open { .. } => open,
        };
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs requests for one platform with retries behind a shared circuit breaker.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    platform: Platform,
    config: RetryConfig,
    breaker: Arc<Mutex<CircuitBreaker>>,
}

impl RetryExecutor {
    pub fn new(platform: Platform, config: RetryConfig) -> Self {
        Self {
            platform,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(&config))),
            config,
        }
    }

    pub fn circuit(&self) -> Circuit {
        lock(&self.breaker).circuit()
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, label: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        if !lock(&self.breaker).allow_request() {
            debug!("{} circuit open, skipping {}", self.platform, label);
            return Err(SourceError::CircuitOpen {
                platform: self.platform,
            }
            .into());
        }

        let mut attempt = 0u32;
        loop {
            let error = match operation().await {
                Ok(value) => {
                    lock(&self.breaker).record_success();
                    if attempt > 0 {
                        info!("{} succeeded after {} retries", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = if attempt + 1 < self.config.max_attempts {
                self.config.delay_for(&error, attempt)
            } else {
                None
            };
            let Some(delay) = delay else {
                lock(&self.breaker).record_failure();
                warn!("{} failed after {} attempt(s): {}", label, attempt + 1, error);
                return Err(error);
            };

            info!("Retrying {} in {:?}: {}", label, delay, error);
            sleep(delay).await;
            attempt += 1;
        }
    }
}
