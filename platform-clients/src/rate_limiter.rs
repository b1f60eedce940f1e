use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum spacing between requests once the burst is spent.
    pub min_interval: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// One request per `delay`, no bursting.
    pub fn paced(delay: Duration) -> Self {
        Self {
            min_interval: delay,
            burst_allowance: 1,
        }
    }

    pub fn unlimited() -> Self {
        Self::paced(Duration::ZERO)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Arc<Mutex<BucketState>>,
    capacity: f64,
    /// Tokens per second; `None` means requests are never delayed.
    refill_rate: Option<f64>,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst_allowance.max(1));
        let refill_rate = if config.min_interval.is_zero() {
            None
        } else {
            Some(1.0 / config.min_interval.as_secs_f64())
        };

        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            refill_rate,
        }
    }

    /// Take `tokens_needed` tokens, or report how long until they are available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let Some(rate) = self.refill_rate else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        match self.refill_rate {
            None => self.capacity,
            Some(rate) => {
                let state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                (state.tokens + elapsed * rate).min(self.capacity)
            }
        }
    }
}

/// Paces the requests one adapter sends to its platform.
#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            token_bucket: TokenBucket::new(&config),
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        while let Err(wait_time) = self.token_bucket.acquire(1.0).await {
            tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
            sleep(wait_time).await;
        }
        RateLimitPermit {
            queue_wait_time: start_time.elapsed(),
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        self.token_bucket.available_tokens().await
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    pub queue_wait_time: Duration,
}
