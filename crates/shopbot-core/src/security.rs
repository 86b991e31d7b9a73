use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

// ============== Authorization ==============

/// Admin actions are allowed only for configured admin ids.
pub fn is_admin(tg_id: Option<i64>, admins: &[i64]) -> bool {
    let Some(tg_id) = tg_id else {
        return false;
    };
    admins.contains(&tg_id)
}

// ============== Rate Limiter (Token Bucket) ==============

/// Full buckets are dropped once this many users are tracked.
const PRUNE_AT: usize = 1024;

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-user token bucket, used to damp repeated buy clicks.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_tokens: f64,
    refill_per_sec: f64,
    buckets: HashMap<i64, Bucket>,
    prune_at: usize,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_tokens: u32, window: Duration) -> Self {
        let max_tokens_f = max_tokens as f64;
        let window_secs = window.as_secs_f64().max(1e-9);

        Self {
            enabled,
            max_tokens: max_tokens_f,
            refill_per_sec: max_tokens_f / window_secs,
            buckets: HashMap::new(),
            prune_at: PRUNE_AT,
        }
    }

    pub fn check(&mut self, tg_id: i64) -> (bool, Option<Duration>) {
        self.check_at(tg_id, Instant::now())
    }

    pub fn check_at(&mut self, tg_id: i64, now: Instant) -> (bool, Option<Duration>) {
        if !self.enabled {
            return (true, None);
        }
        if self.buckets.len() >= self.prune_at {
            self.prune(now);
        }

        let bucket = self.buckets.entry(tg_id).or_insert_with(|| Bucket {
            tokens: self.max_tokens,
            last_update: now,
        });

        let elapsed = now.duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return (true, None);
        }

        if self.refill_per_sec <= 0.0 {
            return (false, None);
        }
        let secs = (1.0 - bucket.tokens) / self.refill_per_sec;
        (false, Some(Duration::from_secs_f64(secs.max(0.0))))
    }

    /// A bucket that has refilled completely is indistinguishable from a new one.
    fn prune(&mut self, now: Instant) {
        let (max, rate) = (self.max_tokens, self.refill_per_sec);
        self.buckets.retain(|_, b| {
            let elapsed = now.saturating_duration_since(b.last_update).as_secs_f64();
            b.tokens + elapsed * rate < max
        });
        self.prune_at = (self.buckets.len() * 2).max(PRUNE_AT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_requires_known_id() {
        assert!(is_admin(Some(5), &[1, 5]));
        assert!(!is_admin(Some(6), &[1, 5]));
        assert!(!is_admin(None, &[1, 5]));
        assert!(!is_admin(Some(1), &[]));
    }

    #[test]
    fn bucket_blocks_then_refills() {
        let mut rl = RateLimiter::new(true, 2, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(rl.check_at(1, t0).0);
        assert!(rl.check_at(1, t0).0);
        let (ok, retry) = rl.check_at(1, t0);
        assert!(!ok);
        assert!(retry.unwrap() > Duration::from_secs(4));

        // Another user has a separate bucket.
        assert!(rl.check_at(2, t0).0);

        // One token refills after window / max_tokens.
        assert!(rl.check_at(1, t0 + Duration::from_secs(6)).0);
    }

    #[test]
    fn refilled_buckets_are_pruned() {
        let mut rl = RateLimiter::new(true, 2, Duration::from_secs(10));
        let t0 = Instant::now();
        for user in 0..PRUNE_AT as i64 {
            assert!(rl.check_at(user, t0).0);
        }
        assert_eq!(rl.buckets.len(), PRUNE_AT);

        // A minute later every bucket is full again.
        let later = t0 + Duration::from_secs(60);
        assert!(rl.check_at(-1, later).0);
        assert_eq!(rl.buckets.len(), 1);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let mut rl = RateLimiter::new(false, 0, Duration::from_secs(1));
        for _ in 0..10 {
            assert!(rl.check(9).0);
        }
    }
}
