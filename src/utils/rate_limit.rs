// src/utils/rate_limit.rs
use std::future::Future;
use std::time::Duration;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn, error};

use crate::error::{FinderResult, FinderError};

/// Enforces a minimum interval between consecutive operations
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval_secs: f64) -> Self {
        Self {
            min_interval: secs(min_interval_secs),
            last: Mutex::new(None),
        }
    }

    /// Sleep until the interval since the previous call has elapsed
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!("Rate limit: sleeping {:.2?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }

        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Convert fractional seconds into a duration, clamping negatives to zero
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Retry an async operation, doubling the delay after every failure
pub async fn retry_with_backoff<T, F, Fut>(
    operation: &str,
    retries: u32,
    base_delay: Duration,
    mut op: F,
) -> FinderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FinderResult<T>>,
{
    let mut delay = base_delay;
    let mut last_error = None;

    for attempt in 0..retries.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {} failed: {}", attempt + 1, e);
                last_error = Some(e);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    error!("All retries failed for {}", operation);
    Err(last_error.unwrap_or_else(|| FinderError::UnexpectedError(format!("{} never ran", operation))))
}

/// Randomized pause used to pace requests against platforms that fingerprint clients
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub min_delay: f64,
    pub max_delay: f64,
    pub max_jitter: f64,
}

impl Pacing {
    pub fn new(min_delay: f64, max_delay: f64) -> Self {
        Self { min_delay, max_delay, max_jitter: 5.0 }
    }

    /// No waiting at all
    pub fn disabled() -> Self {
        Self { min_delay: 0.0, max_delay: 0.0, max_jitter: 0.0 }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_delay <= 0.0 && self.max_jitter <= 0.0
    }

    /// Draw the next pause: uniform in `[min, max]` plus uniform jitter
    pub fn next_delay(&self) -> Duration {
        if self.is_disabled() {
            return Duration::ZERO;
        }

        let mut rng = rand::thread_rng();
        let (low, high) = if self.min_delay <= self.max_delay {
            (self.min_delay.max(0.0), self.max_delay.max(0.0))
        } else {
            (self.max_delay.max(0.0), self.min_delay.max(0.0))
        };
        let base = if high > low { rng.gen_range(low..=high) } else { low };
        let jitter = if self.max_jitter > 0.0 { rng.gen_range(0.0..=self.max_jitter) } else { 0.0 };

        secs(base + jitter)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Sleeping {:.2?} for request pacing", delay);
        tokio::time::sleep(delay).await;
    }
}

/// Sleep a uniform random duration in `[min_delay, max_delay]` plus up to five seconds of jitter
pub async fn jittered_delay(min_delay: f64, max_delay: f64) {
    Pacing::new(min_delay, max_delay).pause().await;
}

/// Counts operations and signals when a session should be rotated
#[derive(Debug, Clone)]
pub struct SessionRotator {
    rotate_every: u32,
    counter: u32,
}

impl SessionRotator {
    pub fn new(rotate_every: u32) -> Self {
        Self { rotate_every, counter: 0 }
    }

    /// Increase the counter and return true if rotation is due
    pub fn increment(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.rotate_every {
            self.counter = 0;
            return true;
        }
        false
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
