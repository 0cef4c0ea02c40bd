//! Login throttling.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Stale usernames are pruned after this many checks.
const PRUNE_EVERY: u64 = 1024;

/// Per-username limiter for login attempts.
///
/// Keys come from unauthenticated input, so usernames whose quota has fully
/// replenished are dropped from the store periodically.
pub struct LoginRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    checks: AtomicU64,
}

impl LoginRateLimiter {
    /// Allow `attempts_per_minute` login attempts per username.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        Self::with_quota(Quota::per_minute(
            NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN),
        ))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
        }
    }

    /// Whether another attempt for `username` is allowed right now.
    #[must_use]
    pub fn check(&self, username: &str) -> bool {
        let allowed = self.limiter.check_key(&username.to_string()).is_ok();
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_EVERY == 0 {
            self.retain_recent();
        }
        allowed
    }

    /// Drop usernames whose attempts have fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        tracing::trace!(tracked = self.limiter.len(), "Pruned login limiter");
    }

    /// Number of usernames currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("tracked", &self.tracked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_limit_is_per_username() {
        let limiter = LoginRateLimiter::new(2);
        assert!(limiter.check("alice"));
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        assert!(limiter.check("bob"));
    }

    #[test]
    fn test_stale_usernames_are_dropped() {
        let quota = Quota::with_period(Duration::from_millis(1)).unwrap();
        let limiter = LoginRateLimiter::with_quota(quota);

        for i in 0..100 {
            assert!(limiter.check(&format!("user-{i}")));
        }
        assert_eq!(limiter.tracked(), 100);

        std::thread::sleep(Duration::from_millis(50));
        limiter.retain_recent();
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_checks_prune_periodically() {
        let quota = Quota::with_period(Duration::from_millis(1)).unwrap();
        let limiter = LoginRateLimiter::with_quota(quota);

        for i in 0..PRUNE_EVERY - 1 {
            let _ = limiter.check(&format!("user-{i}"));
        }
        std::thread::sleep(Duration::from_millis(50));

        // This check crosses the prune boundary; only its own key survives.
        assert!(limiter.check("late"));
        assert_eq!(limiter.tracked(), 1);
    }
}
