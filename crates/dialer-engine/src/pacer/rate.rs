//! Rate limiting for push-mode dialing

use chrono::{DateTime, Utc};

use crate::database::AbandonStats;

// Refill sums like ten 0.1s land just under a whole token
const TOKEN_EPSILON: f64 = 1e-9;

/// Token bucket refilled continuously at the campaign's dial rate
///
/// Capacity is one tick's worth of calls (at least one), so a campaign that
/// sat idle cannot burst past its rate when it resumes.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate_per_minute: f64,
    capacity: f64,
    tokens: f64,
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// A full bucket for `rate_per_minute`, sized for `tick`
    pub fn new(rate_per_minute: f64, tick: std::time::Duration, now: DateTime<Utc>) -> Self {
        let rate_per_minute = rate_per_minute.max(0.0);
        let capacity = (rate_per_minute / 60.0 * tick.as_secs_f64()).max(1.0);
        Self {
            rate_per_minute,
            capacity,
            tokens: capacity,
            last_refill: now,
        }
    }

    pub fn rate_per_minute(&self) -> f64 {
        self.rate_per_minute
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Switch to a new rate without handing out fresh tokens
    ///
    /// Time up to `now` is credited at the old rate; the balance carries over,
    /// clamped to the new capacity.
    pub fn retarget(&mut self, rate_per_minute: f64, tick: std::time::Duration, now: DateTime<Utc>) {
        self.refill(now);
        let rate_per_minute = rate_per_minute.max(0.0);
        self.rate_per_minute = rate_per_minute;
        self.capacity = (rate_per_minute / 60.0 * tick.as_secs_f64()).max(1.0);
        self.tokens = self.tokens.min(self.capacity);
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_refill).num_milliseconds();
        if elapsed_ms <= 0 {
            return;
        }
        let added = self.rate_per_minute / 60_000.0 * elapsed_ms as f64;
        self.tokens = (self.tokens + added).min(self.capacity);
        self.last_refill = now;
    }

    /// Whole tokens available at `now`
    pub fn available(&mut self, now: DateTime<Utc>) -> u32 {
        self.refill(now);
        (self.tokens + TOKEN_EPSILON).floor() as u32
    }

    pub fn try_take(&mut self, now: DateTime<Utc>) -> bool {
        self.refill(now);
        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }
}

/// Multiplier applied to predictive pacing from the recent abandon rate
///
/// Returns `1.0` until enough calls were observed or while the rate stays at
/// or under `threshold`; above it the factor is `threshold / rate`, floored at
/// `min_factor` so dialing slows but never stops.
pub fn throttle_factor(stats: &AbandonStats, threshold: f64, min_samples: u32, min_factor: f64) -> f64 {
    if stats.samples() < i64::from(min_samples) || stats.samples() == 0 {
        return 1.0;
    }
    let rate = stats.rate();
    if rate <= threshold {
        return 1.0;
    }
    (threshold / rate).clamp(min_factor, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_bucket_starts_full_and_refills() {
        // 120/min with a 1s tick holds two tokens
        let mut bucket = TokenBucket::new(120.0, Duration::from_secs(1), at(0));
        assert_eq!(bucket.available(at(0)), 2);
        assert!(bucket.try_take(at(0)));
        assert!(bucket.try_take(at(0)));
        assert!(!bucket.try_take(at(0)));

        assert_eq!(bucket.available(at(1)), 2);
        // Never exceeds capacity after a long idle period
        assert_eq!(bucket.available(at(600)), 2);
    }

    #[test]
    fn test_slow_rate_keeps_a_single_token() {
        // 6/min: one call every ten seconds
        let mut bucket = TokenBucket::new(6.0, Duration::from_secs(1), at(0));
        assert!(bucket.try_take(at(0)));
        assert!(!bucket.try_take(at(5)));
        assert!(bucket.try_take(at(10)));
        assert_eq!(bucket.capacity(), 1.0);
    }

    #[test]
    fn test_dispatch_bounded_over_window() {
        let mut bucket = TokenBucket::new(30.0, Duration::from_secs(1), at(0));
        let mut taken = 0;
        for second in 0..=120 {
            while bucket.try_take(at(second)) {
                taken += 1;
            }
        }
        // 30/min over two minutes plus the initial token
        assert!(taken <= 61, "took {}", taken);
        assert!(taken >= 59, "took {}", taken);
    }

    #[test]
    fn test_retarget_keeps_the_balance() {
        let tick = Duration::from_secs(1);
        let mut bucket = TokenBucket::new(6.0, tick, at(0));
        assert!(bucket.try_take(at(0)));

        // Flapping between two rates must not refill the bucket
        for second in 0..5 {
            let rate = if second % 2 == 0 { 8.0 } else { 6.0 };
            bucket.retarget(rate, tick, at(second));
            assert!(!bucket.try_take(at(second)), "token at {}s", second);
        }
        assert_eq!(bucket.rate_per_minute(), 8.0);

        // A larger capacity is earned, not granted
        bucket.retarget(600.0, tick, at(5));
        assert_eq!(bucket.capacity(), 10.0);
        assert!(bucket.available(at(5)) < 2);
        assert_eq!(bucket.available(at(6)), 10);

        bucket.retarget(6.0, tick, at(6));
        assert_eq!(bucket.available(at(6)), 1);
    }

    #[test]
    fn test_throttle_factor() {
        let quiet = AbandonStats { abandoned: 0, completed: 50 };
        assert_eq!(throttle_factor(&quiet, 0.03, 20, 0.25), 1.0);

        let few = AbandonStats { abandoned: 3, completed: 2 };
        assert_eq!(throttle_factor(&few, 0.03, 20, 0.25), 1.0);

        let hot = AbandonStats { abandoned: 6, completed: 94 };
        assert!((throttle_factor(&hot, 0.03, 20, 0.25) - 0.5).abs() < 1e-9);

        let zero_threshold = AbandonStats { abandoned: 1, completed: 99 };
        assert_eq!(throttle_factor(&zero_threshold, 0.0, 20, 0.25), 0.25);
    }
}
