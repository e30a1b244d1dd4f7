//! Abuse guards: fixed-window rate limiting for chat turns and a
//! failure-window lockout for login attempts.
//!
//! Time is always an explicit `now_ms` argument, so every guard decision
//! is reproducible in tests. Counter state lives behind the
//! [`CounterStore`] trait; a failing primary store degrades to an
//! in-process fallback instead of refusing turns.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Chat turns allowed per window.
pub const CHAT_LIMIT: u32 = 30;
/// Chat window length in milliseconds.
pub const CHAT_WINDOW_MS: u64 = 60_000;

/// Outcome of a rate check. `remaining` is what is left after this
/// request was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: u64,
}

impl GuardDecision {
    /// Whole seconds until the window resets, rounded up, never zero
    /// while a wait remains.
    pub fn retry_after_seconds(&self, now_ms: u64) -> u64 {
        let wait = self.reset_at_ms.saturating_sub(now_ms);
        (wait + 999) / 1_000
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(detail) => write!(f, "counter store unavailable: {detail}"),
        }
    }
}

impl Error for StoreError {}

/// Windowed counter storage. `incr` counts one hit against `key` and
/// returns the count after the increment plus the window's reset time.
pub trait CounterStore: Send + Sync {
    fn incr(&self, key: &str, window_ms: u64, now_ms: u64) -> Result<(u32, u64), StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct CounterWindow {
    count: u32,
    reset_at_ms: u64,
}

/// Process-local counter store. Windows reset lazily on first touch
/// after expiry.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<BTreeMap<String, CounterWindow>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn incr(&self, key: &str, window_ms: u64, now_ms: u64) -> Result<(u32, u64), StoreError> {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let window = counters
            .entry(key.to_string())
            .or_insert(CounterWindow {
                count: 0,
                reset_at_ms: now_ms + window_ms,
            });
        if now_ms >= window.reset_at_ms {
            window.count = 0;
            window.reset_at_ms = now_ms + window_ms;
        }
        window.count = window.count.saturating_add(1);
        Ok((window.count, window.reset_at_ms))
    }
}

/// Fixed-window limiter over a pluggable store. When the primary store
/// errors the check is retried against an in-process fallback, so a
/// storage outage throttles imprecisely instead of blocking chat.
pub struct RateLimiter<S: CounterStore> {
    primary: S,
    fallback: MemoryCounterStore,
    limit: u32,
    window_ms: u64,
}

impl RateLimiter<MemoryCounterStore> {
    /// Limiter with no external store at all.
    pub fn in_memory(limit: u32, window_ms: u64) -> Self {
        Self::new(MemoryCounterStore::new(), limit, window_ms)
    }
}

impl<S: CounterStore> RateLimiter<S> {
    pub fn new(primary: S, limit: u32, window_ms: u64) -> Self {
        Self {
            primary,
            fallback: MemoryCounterStore::new(),
            limit,
            window_ms,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request against `key` and decide whether it may pass.
    pub fn check(&self, key: &str, now_ms: u64) -> GuardDecision {
        let (count, reset_at_ms) = match self.primary.incr(key, self.window_ms, now_ms) {
            Ok(counted) => counted,
            Err(_) => self
                .fallback
                .incr(key, self.window_ms, now_ms)
                .unwrap_or((1, now_ms + self.window_ms)),
        };
        GuardDecision {
            allowed: count <= self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at_ms,
        }
    }
}

/// Login policy: failures tolerated per window before a lockout.
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy {
    pub max_failures: u32,
    pub window_ms: u64,
    pub lockout_ms: u64,
}

impl LoginPolicy {
    /// Five failures in ten minutes locks the key for fifteen.
    pub fn default_policy() -> Self {
        Self {
            max_failures: 5,
            window_ms: 600_000,
            lockout_ms: 900_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginCheck {
    Allowed { failures_in_window: u32 },
    Locked { retry_after_ms: u64 },
}

#[derive(Debug, Clone, Copy)]
struct LoginWindow {
    failures: u32,
    window_reset_at_ms: u64,
    locked_until_ms: Option<u64>,
}

/// Per-key login failure tracker with lockout.
pub struct LoginGuard {
    state: Mutex<BTreeMap<String, LoginWindow>>,
    policy: LoginPolicy,
}

impl LoginGuard {
    pub fn new(policy: LoginPolicy) -> Self {
        Self {
            state: Mutex::new(BTreeMap::new()),
            policy,
        }
    }

    /// Whether `key` may attempt a login right now. An expired lock
    /// clears the key entirely, so the next attempt starts fresh.
    pub fn check(&self, key: &str, now_ms: u64) -> LoginCheck {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(window) = state.get_mut(key) else {
            return LoginCheck::Allowed {
                failures_in_window: 0,
            };
        };

        if let Some(locked_until) = window.locked_until_ms {
            if now_ms < locked_until {
                return LoginCheck::Locked {
                    retry_after_ms: locked_until - now_ms,
                };
            }
            state.remove(key);
            return LoginCheck::Allowed {
                failures_in_window: 0,
            };
        }

        if now_ms >= window.window_reset_at_ms {
            state.remove(key);
            return LoginCheck::Allowed {
                failures_in_window: 0,
            };
        }
        LoginCheck::Allowed {
            failures_in_window: window.failures,
        }
    }

    /// Record a failed attempt. The failure that reaches the policy
    /// maximum inside one window triggers the lockout.
    pub fn record_failure(&self, key: &str, now_ms: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let window = state.entry(key.to_string()).or_insert(LoginWindow {
            failures: 0,
            window_reset_at_ms: now_ms + self.policy.window_ms,
            locked_until_ms: None,
        });

        if window.locked_until_ms.is_some() {
            return;
        }
        if now_ms >= window.window_reset_at_ms {
            window.failures = 0;
            window.window_reset_at_ms = now_ms + self.policy.window_ms;
        }
        window.failures = window.failures.saturating_add(1);
        if window.failures >= self.policy.max_failures {
            window.locked_until_ms = Some(now_ms + self.policy.lockout_ms);
        }
    }

    /// A successful login clears the key's history.
    pub fn record_success(&self, key: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::in_memory(3, 1_000);
        let now = 10_000;

        for expected_remaining in [2_u32, 1, 0] {
            let decision = limiter.check("k", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let blocked = limiter.check("k", now);
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.reset_at_ms, 11_000);
        assert_eq!(blocked.retry_after_seconds(now), 1);
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::in_memory(1, 1_000);
        assert!(limiter.check("k", 0).allowed);
        assert!(!limiter.check("k", 500).allowed);
        assert!(limiter.check("k", 1_000).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::in_memory(1, 1_000);
        assert!(limiter.check("a", 0).allowed);
        assert!(limiter.check("b", 0).allowed);
        assert!(!limiter.check("a", 10).allowed);
        assert!(!limiter.check("b", 10).allowed);
    }

    #[test]
    fn retry_after_rounds_up_and_hits_zero_at_reset() {
        let decision = GuardDecision {
            allowed: false,
            remaining: 0,
            reset_at_ms: 10_500,
        };
        assert_eq!(decision.retry_after_seconds(10_000), 1);
        assert_eq!(decision.retry_after_seconds(8_400), 3);
        assert_eq!(decision.retry_after_seconds(10_500), 0);
    }

    struct FailingStore;

    impl CounterStore for FailingStore {
        fn incr(&self, _: &str, _: u64, _: u64) -> Result<(u32, u64), StoreError> {
            Err(StoreError::Unavailable("down for test".to_string()))
        }
    }

    #[test]
    fn failing_primary_store_degrades_to_the_fallback() {
        let limiter = RateLimiter::new(FailingStore, 2, 1_000);
        assert!(limiter.check("k", 0).allowed);
        assert!(limiter.check("k", 1).allowed);
        assert!(!limiter.check("k", 2).allowed, "fallback still counts");
    }

    #[test]
    fn login_guard_locks_after_max_failures() {
        let guard = LoginGuard::new(LoginPolicy::default_policy());
        let now = 1_000_000;

        for _ in 0..4 {
            guard.record_failure("key", now);
            assert!(matches!(
                guard.check("key", now),
                LoginCheck::Allowed { .. }
            ));
        }
        guard.record_failure("key", now);
        match guard.check("key", now) {
            LoginCheck::Locked { retry_after_ms } => assert_eq!(retry_after_ms, 900_000),
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[test]
    fn lockout_retry_shrinks_as_time_passes_and_expires() {
        let guard = LoginGuard::new(LoginPolicy::default_policy());
        for _ in 0..5 {
            guard.record_failure("key", 0);
        }

        let early = match guard.check("key", 1_000) {
            LoginCheck::Locked { retry_after_ms } => retry_after_ms,
            other => panic!("expected lock, got {other:?}"),
        };
        let late = match guard.check("key", 600_000) {
            LoginCheck::Locked { retry_after_ms } => retry_after_ms,
            other => panic!("expected lock, got {other:?}"),
        };
        assert!(late < early);

        assert_eq!(
            guard.check("key", 900_000),
            LoginCheck::Allowed {
                failures_in_window: 0
            }
        );
    }

    #[test]
    fn failure_window_expires_without_a_lockout() {
        let guard = LoginGuard::new(LoginPolicy::default_policy());
        for i in 0..4 {
            guard.record_failure("key", i);
        }
        // Window lapses; the next failure starts a fresh count.
        guard.record_failure("key", 700_000);
        assert_eq!(
            guard.check("key", 700_001),
            LoginCheck::Allowed {
                failures_in_window: 1
            }
        );
    }

    #[test]
    fn success_clears_failure_history() {
        let guard = LoginGuard::new(LoginPolicy::default_policy());
        for _ in 0..3 {
            guard.record_failure("key", 0);
        }
        guard.record_success("key");
        assert_eq!(
            guard.check("key", 1),
            LoginCheck::Allowed {
                failures_in_window: 0
            }
        );
    }
}
