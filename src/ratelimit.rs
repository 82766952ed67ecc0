use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Per-user request-rate state.
#[derive(Debug, Default)]
struct RateState {
    /// Served requests since the last block (or since first contact).
    count: u32,
    /// Lockout expiry. Stale values are harmless — reads compare against
    /// now, so entries are never evicted and storage grows with distinct
    /// users only.
    blocked_until: Option<Instant>,
}

/// Outcome of recording one served request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The request was counted; the user stays under the limit.
    Counted(u32),
    /// This request crossed the limit: a lockout was imposed and the
    /// counter reset. The caller must terminate the session.
    LimitReached,
}

/// Per-user request counter with timed lockout.
///
/// Keyed by username, shared across all sessions of that user. The compound
/// increment → threshold check → impose-block runs under the map's per-shard
/// entry lock, so two sessions of the same user can never both observe the
/// pre-threshold count and double-impose a block.
#[derive(Debug)]
pub struct RateLimiter {
    states: DashMap<String, RateState>,
    limit: u32,
    block: Duration,
}

impl RateLimiter {
    /// Creates a limiter that locks a user out for `block` after `limit`
    /// served requests.
    #[must_use]
    pub fn new(limit: u32, block: Duration) -> Self {
        Self {
            states: DashMap::new(),
            limit,
            block,
        }
    }

    /// Returns the remaining lockout duration iff `user` is blocked right now.
    #[must_use]
    pub fn block_remaining(&self, user: &str) -> Option<Duration> {
        self.block_remaining_at(user, Instant::now())
    }

    fn block_remaining_at(&self, user: &str, now: Instant) -> Option<Duration> {
        let until = self.states.get(user)?.blocked_until?;
        if until > now {
            Some(until - now)
        } else {
            None
        }
    }

    /// Record one served request for `user` atomically.
    ///
    /// Initializes the counter to 1 on first contact. When the
    /// post-increment count reaches the limit, the lockout is imposed and
    /// the counter reset in the same step.
    pub fn record(&self, user: &str) -> Verdict {
        self.record_at(user, Instant::now())
    }

    fn record_at(&self, user: &str, now: Instant) -> Verdict {
        let mut state = self.states.entry(user.to_string()).or_default();
        state.count += 1;
        if state.count >= self.limit {
            state.count = 0;
            state.blocked_until = Some(now + self.block);
            Verdict::LimitReached
        } else {
            Verdict::Counted(state.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(5, Duration::from_secs(60))
    }

    #[test]
    fn requests_below_limit_are_counted() {
        let limiter = limiter();
        for expected in 1..=4 {
            assert_eq!(limiter.record("user1"), Verdict::Counted(expected));
        }
        assert!(limiter.block_remaining("user1").is_none());
    }

    #[test]
    fn fifth_request_imposes_block_and_resets_count() {
        let limiter = limiter();
        for _ in 0..4 {
            limiter.record("user1");
        }
        assert_eq!(limiter.record("user1"), Verdict::LimitReached);

        let remaining = limiter.block_remaining("user1").unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));

        // Counter restarted from zero for the next window.
        assert_eq!(limiter.states.get("user1").unwrap().count, 0);
    }

    #[test]
    fn expired_block_reads_as_not_blocked() {
        let limiter = limiter();
        limiter.states.insert(
            "user1".to_string(),
            RateState {
                count: 0,
                blocked_until: Some(Instant::now() - Duration::from_secs(1)),
            },
        );
        assert!(limiter.block_remaining("user1").is_none());
    }

    #[test]
    fn block_expiry_boundary_is_strict() {
        let limiter = limiter();
        let now = Instant::now();
        limiter.states.insert(
            "user1".to_string(),
            RateState {
                count: 0,
                blocked_until: Some(now),
            },
        );
        // `until > now` is strict: at the exact expiry instant the user is free.
        assert!(limiter.block_remaining_at("user1", now).is_none());
        assert!(limiter
            .block_remaining_at("user1", now - Duration::from_millis(1))
            .is_some());
    }

    #[test]
    fn unknown_user_is_not_blocked() {
        assert!(limiter().block_remaining("nobody").is_none());
    }

    #[test]
    fn users_are_counted_independently() {
        let limiter = limiter();
        for _ in 0..4 {
            limiter.record("user1");
        }
        assert_eq!(limiter.record("user2"), Verdict::Counted(1));
        assert_eq!(limiter.record("user1"), Verdict::LimitReached);
        assert!(limiter.block_remaining("user2").is_none());
    }

    #[test]
    fn counting_resumes_after_a_block() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.record("user1");
        }
        // A blocked user's sessions are disconnected, but the counter math
        // keeps working for whoever records next.
        assert_eq!(limiter.record("user1"), Verdict::Counted(1));
    }

    #[test]
    fn concurrent_records_never_lose_updates() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let lockouts = std::sync::atomic::AtomicUsize::new(0);

        // 4 threads x 10 records = 40 increments; every 5th crosses the
        // threshold, so exactly 8 lockouts regardless of interleaving.
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10 {
                        if limiter.record("user1") == Verdict::LimitReached {
                            lockouts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(lockouts.load(std::sync::atomic::Ordering::Relaxed), 8);
        assert_eq!(limiter.states.get("user1").unwrap().count, 0);
    }
}
