//! Per-user, global, and per-command cooldown gate.
//!
//! Consulted once per accepted, non-gated command immediately before
//! admission. Check and record are a single atomic operation under one
//! lock: messages from the same poll batch may be processed concurrently
//! and must serialize here.
//!
//! Vote casts are deliberately not passed through this gate; only the
//! message that opens a vote session consumes a cooldown slot.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

/// Rejection carrying the remaining wait.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("On cooldown: {}s remaining", .retry_after.as_secs().max(1))]
pub struct CooldownActive {
    /// How long until the next command would be accepted.
    pub retry_after: Duration,
}

/// Result type for rate limit checks.
pub type RateResult = Result<(), CooldownActive>;

#[derive(Default)]
struct Inner {
    /// Per-user time of the last accepted command. Monotonically
    /// non-decreasing: only ever overwritten with a later `now`.
    user_last: HashMap<String, Instant>,
    /// Time of the last accepted command from anyone.
    global_last: Option<Instant>,
    /// Per-command time of the last accepted use.
    command_last: HashMap<&'static str, Instant>,
}

/// The cooldown gate.
pub struct RateLimiter {
    user_cooldown: Duration,
    global_cooldown: Duration,
    command_intervals: HashMap<&'static str, Duration>,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new(user_cooldown: Duration, global_cooldown: Duration) -> Self {
        Self {
            user_cooldown,
            global_cooldown,
            command_intervals: HashMap::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Require at least `interval` between accepted uses of `command`,
    /// regardless of issuer. Used to keep chatty query commands from
    /// flooding the channel.
    pub fn set_command_interval(&mut self, command: &'static str, interval: Duration) {
        self.command_intervals.insert(command, interval);
    }

    /// Check every applicable cooldown and, only if all pass, record the
    /// acceptance at `now`. A rejection mutates nothing.
    ///
    /// Admins bypass the gate unconditionally and leave no trace in it.
    pub fn check_and_record(
        &self,
        user_id: &str,
        command: &'static str,
        now: Instant,
        is_admin: bool,
    ) -> RateResult {
        if is_admin {
            return Ok(());
        }

        let mut inner = self.inner.lock().expect("rate limiter lock poisoned");

        if let Some(retry_after) = remaining(inner.global_last, now, self.global_cooldown) {
            trace!(user_id, command, ?retry_after, "rejected by global cooldown");
            return Err(CooldownActive { retry_after });
        }

        let user_last = inner.user_last.get(user_id).copied();
        if let Some(retry_after) = remaining(user_last, now, self.user_cooldown) {
            trace!(user_id, command, ?retry_after, "rejected by user cooldown");
            return Err(CooldownActive { retry_after });
        }

        if let Some(&interval) = self.command_intervals.get(command) {
            let last = inner.command_last.get(command).copied();
            if let Some(retry_after) = remaining(last, now, interval) {
                trace!(user_id, command, ?retry_after, "rejected by command interval");
                return Err(CooldownActive { retry_after });
            }
        }

        inner.user_last.insert(user_id.to_string(), now);
        inner.global_last = Some(now);
        if self.command_intervals.contains_key(command) {
            inner.command_last.insert(command, now);
        }
        Ok(())
    }
}

/// Time still to wait, or None when the cooldown has elapsed. Missing
/// state counts as unlimited elapsed time.
fn remaining(last: Option<Instant>, now: Instant, cooldown: Duration) -> Option<Duration> {
    let last = last?;
    let elapsed = now.saturating_duration_since(last);
    if elapsed < cooldown {
        Some(cooldown - elapsed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        // No global cooldown unless a test opts in.
        RateLimiter::new(Duration::from_secs(3), Duration::ZERO)
    }

    #[test]
    fn test_first_command_is_allowed() {
        let rl = limiter();
        assert!(rl
            .check_and_record("u1", "move", Instant::now(), false)
            .is_ok());
    }

    #[test]
    fn test_rejects_within_cooldown_window() {
        let rl = limiter();
        let t1 = Instant::now();
        rl.check_and_record("u1", "move", t1, false).unwrap();

        let t2 = t1 + Duration::from_secs(1);
        let err = rl.check_and_record("u1", "move", t2, false).unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(2));
    }

    #[test]
    fn test_allows_after_cooldown_elapses() {
        let rl = limiter();
        let t1 = Instant::now();
        rl.check_and_record("u1", "move", t1, false).unwrap();
        assert!(rl
            .check_and_record("u1", "move", t1 + Duration::from_secs(3), false)
            .is_ok());
    }

    #[test]
    fn test_rejection_mutates_nothing() {
        let rl = limiter();
        let t1 = Instant::now();
        rl.check_and_record("u1", "move", t1, false).unwrap();

        // Rejected attempt at t1+1 must not push the window forward:
        // a retry at t1+3 still succeeds.
        rl.check_and_record("u1", "move", t1 + Duration::from_secs(1), false)
            .unwrap_err();
        assert!(rl
            .check_and_record("u1", "move", t1 + Duration::from_secs(3), false)
            .is_ok());
    }

    #[test]
    fn test_users_are_independent() {
        let rl = limiter();
        let t = Instant::now();
        rl.check_and_record("u1", "move", t, false).unwrap();
        assert!(rl.check_and_record("u2", "move", t, false).is_ok());
    }

    #[test]
    fn test_admin_bypasses_and_leaves_no_trace() {
        let rl = RateLimiter::new(Duration::from_secs(3), Duration::from_secs(1));
        let t = Instant::now();
        rl.check_and_record("boss", "move", t, true).unwrap();

        // The admin's command set neither the global nor their user clock.
        assert!(rl.check_and_record("u1", "move", t, false).is_ok());
        assert!(rl.check_and_record("boss", "move", t, true).is_ok());
    }

    #[test]
    fn test_global_cooldown_spans_users() {
        let rl = RateLimiter::new(Duration::ZERO, Duration::from_millis(500));
        let t = Instant::now();
        rl.check_and_record("u1", "move", t, false).unwrap();

        let err = rl
            .check_and_record("u2", "click", t + Duration::from_millis(100), false)
            .unwrap_err();
        assert_eq!(err.retry_after, Duration::from_millis(400));

        assert!(rl
            .check_and_record("u2", "click", t + Duration::from_millis(500), false)
            .is_ok());
    }

    #[test]
    fn test_command_interval() {
        let mut rl = RateLimiter::new(Duration::ZERO, Duration::ZERO);
        rl.set_command_interval("leaderboard", Duration::from_secs(15));
        let t = Instant::now();

        rl.check_and_record("u1", "leaderboard", t, false).unwrap();
        // A different user hits the shared command interval.
        rl.check_and_record("u2", "leaderboard", t + Duration::from_secs(5), false)
            .unwrap_err();
        // Other commands are unaffected.
        assert!(rl
            .check_and_record("u2", "move", t + Duration::from_secs(5), false)
            .is_ok());
        assert!(rl
            .check_and_record("u2", "leaderboard", t + Duration::from_secs(15), false)
            .is_ok());
    }

    #[test]
    fn test_user_clock_is_monotone() {
        let rl = limiter();
        let t1 = Instant::now();
        rl.check_and_record("u1", "move", t1, false).unwrap();

        // A stale `now` (clock skew between batch workers) cannot move
        // the user's clock backwards: the recorded time only advances.
        let stale = t1 - Duration::from_secs(10);
        rl.check_and_record("u1", "move", stale, false).unwrap_err();
        rl.check_and_record("u1", "move", t1 + Duration::from_secs(1), false)
            .unwrap_err();
    }
}
