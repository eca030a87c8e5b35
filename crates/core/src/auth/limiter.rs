//! Token bucket limits on failed login attempts.
//!
//! Every client (keyed by remote address) owns one bucket per window. A
//! failed attempt takes a token from each; a client with an empty bucket is
//! refused until it refills.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::config::AuthConfig;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Clients tracked before full buckets are pruned.
const PRUNE_THRESHOLD: usize = 1024;

/// Token bucket refilling `capacity` tokens per `period`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Max tokens.
    capacity: f64,
    /// Current available tokens.
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, period: Duration) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / period.as_secs_f64(),
            last_refill: Instant::now(),
        }
    }

    /// Take one token.
    ///
    /// Returns `Err(wait)` with the time until a token is available when the
    /// bucket is empty.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.check()?;
        self.tokens -= 1.0;
        Ok(())
    }

    /// Whether a token is available, without taking it.
    pub fn check(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            Ok(())
        } else if self.refill_rate <= 0.0 {
            Err(Duration::MAX)
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(tokens_needed / self.refill_rate))
        }
    }

    fn is_full(&mut self) -> bool {
        self.refill();
        self.tokens >= self.capacity
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[derive(Debug, Clone)]
struct ClientBuckets {
    minute: TokenBucket,
    day: TokenBucket,
}

/// Per-client limits on failed login attempts.
pub struct LoginLimiter {
    per_minute: u32,
    per_day: u32,
    clients: RwLock<HashMap<String, ClientBuckets>>,
}

impl LoginLimiter {
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_day,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.max_failures_per_minute,
            config.max_failures_per_day,
        )
    }

    /// `Err(retry_after)` while `client` is locked out.
    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let mut clients = self.clients.write().await;
        match clients.get_mut(client) {
            Some(buckets) => {
                buckets.minute.check()?;
                buckets.day.check()
            }
            None => Ok(()),
        }
    }

    /// Count a failed attempt by `client`.
    pub async fn record_failure(&self, client: &str) {
        let mut clients = self.clients.write().await;
        if clients.len() >= PRUNE_THRESHOLD {
            clients.retain(|_, b| !(b.minute.is_full() && b.day.is_full()));
        }

        let buckets = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientBuckets {
                minute: TokenBucket::new(self.per_minute, MINUTE),
                day: TokenBucket::new(self.per_day, DAY),
            });
        // An empty bucket stays empty; the failure is already being refused
        let _ = buckets.minute.try_acquire();
        let _ = buckets.day.try_acquire();
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_token_bucket_drains() {
        let mut bucket = TokenBucket::new(10, MINUTE);

        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        let wait = bucket.try_acquire().unwrap_err();
        // 10 per minute refills one token every 6 seconds
        assert!(wait.as_secs() <= 6);
        assert!(wait.as_millis() > 0);
    }

    #[test]
    fn test_check_does_not_consume() {
        let mut bucket = TokenBucket::new(1, MINUTE);
        assert!(bucket.check().is_ok());
        assert!(bucket.check().is_ok());
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.check().is_err());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(60, MINUTE); // 1 token per second
        for _ in 0..60 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.tokens < 1.0);

        sleep(Duration::from_millis(100)).await;
        bucket.refill();

        assert!(bucket.tokens > 0.05);
        assert!(bucket.tokens < 0.5);
    }

    #[tokio::test]
    async fn test_limiter_locks_out_after_failures() {
        let limiter = LoginLimiter::new(3, 100);

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await.is_ok());
            limiter.record_failure("10.0.0.1").await;
        }

        assert!(limiter.check("10.0.0.1").await.is_err());
        assert!(limiter.check("10.0.0.2").await.is_ok());
    }

    #[tokio::test]
    async fn test_daily_limit_applies() {
        let limiter = LoginLimiter::new(100, 2);
        limiter.record_failure("c").await;
        limiter.record_failure("c").await;

        let wait = limiter.check("c").await.unwrap_err();
        assert!(wait > MINUTE);
    }

    #[tokio::test]
    async fn test_unknown_client_is_allowed() {
        let limiter = LoginLimiter::new(1, 1);
        assert!(limiter.check("never-failed").await.is_ok());
        assert_eq!(limiter.tracked_clients().await, 0);
    }
}
