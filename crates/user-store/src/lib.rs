//! In-memory per-user stats, points, and leaderboard.
//!
//! State lives for the duration of one run; users are created lazily on
//! their first recorded activity and never destroyed. Written by the
//! executor (successes) and the vote coordinator path (vote credits),
//! read by the `stats` and `leaderboard` query commands.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Rank titles by points, lowest threshold first.
const RANK_THRESHOLDS: &[(u64, &str)] = &[
    (0, "Lurker"),
    (10, "Noob"),
    (50, "Script Kiddie"),
    (150, "Hacker"),
    (400, "Sysadmin"),
    (1000, "Kernel Wizard"),
    (2500, "BIOS God"),
    (5000, "Root"),
];

/// Rank title for a points total.
pub fn rank_for(points: u64) -> &'static str {
    let mut rank = RANK_THRESHOLDS[0].1;
    for &(threshold, title) in RANK_THRESHOLDS {
        if points >= threshold {
            rank = title;
        }
    }
    rank
}

/// Snapshot of one user's stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub user_id: String,
    pub display_name: String,
    /// Successfully executed commands.
    pub command_count: u64,
    pub points: u64,
    pub votes_cast: u64,
    pub votes_won: u64,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// Creation order, used to break leaderboard ties (earlier wins).
    seq: u64,
}

impl UserStats {
    /// Rank title for this user's points.
    pub fn rank(&self) -> &'static str {
        rank_for(self.points)
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserStats>,
    next_seq: u64,
}

impl Inner {
    fn entry(&mut self, user_id: &str, display_name: &str) -> &mut UserStats {
        let seq = &mut self.next_seq;
        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let user = UserStats {
                    user_id: user_id.to_string(),
                    display_name: display_name.to_string(),
                    command_count: 0,
                    points: 0,
                    votes_cast: 0,
                    votes_won: 0,
                    joined_at: Utc::now(),
                    last_active: Utc::now(),
                    seq: *seq,
                };
                *seq += 1;
                debug!(user_id, display_name, "created user record");
                user
            });
        // Display names drift on some channels; keep the latest.
        if !display_name.is_empty() && user.display_name != display_name {
            user.display_name = display_name.to_string();
        }
        user.last_active = Utc::now();
        user
    }
}

/// The store. One lock; every operation is a short critical section.
#[derive(Default)]
pub struct UserStore {
    inner: Mutex<Inner>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a successfully executed command.
    pub fn record_success(&self, user_id: &str, display_name: &str, points: u64) {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        let user = inner.entry(user_id, display_name);
        user.command_count += 1;
        user.points += points;
    }

    /// Credit a vote cast.
    pub fn record_vote_cast(&self, user_id: &str, display_name: &str) {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        inner.entry(user_id, display_name).votes_cast += 1;
    }

    /// Credit every voter on a passed vote.
    pub fn record_vote_won(&self, user_id: &str, points: u64) {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        if let Some(user) = inner.users.get_mut(user_id) {
            user.votes_won += 1;
            user.points += points;
        }
    }

    /// Snapshot of one user, if they have any recorded activity.
    pub fn get_stats(&self, user_id: &str) -> Option<UserStats> {
        let inner = self.inner.lock().expect("user store lock poisoned");
        inner.users.get(user_id).cloned()
    }

    /// Top users by executed command count, ties broken by earliest
    /// creation.
    pub fn leaderboard(&self, top_n: usize) -> Vec<UserStats> {
        let inner = self.inner.lock().expect("user store lock poisoned");
        let mut users: Vec<UserStats> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.command_count
                .cmp(&a.command_count)
                .then(a.seq.cmp(&b.seq))
        });
        users.truncate(top_n);
        users
    }

    /// Number of distinct users seen this run.
    pub fn user_count(&self) -> usize {
        self.inner.lock().expect("user store lock poisoned").users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation_on_first_success() {
        let store = UserStore::new();
        assert!(store.get_stats("u1").is_none());

        store.record_success("u1", "alice", 1);
        let stats = store.get_stats("u1").unwrap();
        assert_eq!(stats.command_count, 1);
        assert_eq!(stats.points, 1);
        assert_eq!(stats.display_name, "alice");
    }

    #[test]
    fn test_counts_accumulate() {
        let store = UserStore::new();
        for _ in 0..5 {
            store.record_success("u1", "alice", 2);
        }
        let stats = store.get_stats("u1").unwrap();
        assert_eq!(stats.command_count, 5);
        assert_eq!(stats.points, 10);
    }

    #[test]
    fn test_display_name_updates() {
        let store = UserStore::new();
        store.record_success("u1", "alice", 1);
        store.record_success("u1", "alice_live", 1);
        assert_eq!(store.get_stats("u1").unwrap().display_name, "alice_live");
    }

    #[test]
    fn test_leaderboard_orders_by_count_desc() {
        let store = UserStore::new();
        for _ in 0..3 {
            store.record_success("u1", "alice", 1);
        }
        for _ in 0..7 {
            store.record_success("u2", "bob", 1);
        }
        store.record_success("u3", "carol", 1);

        let board = store.leaderboard(10);
        let ids: Vec<&str> = board.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u1", "u3"]);
    }

    #[test]
    fn test_leaderboard_tie_breaks_by_creation_order() {
        let store = UserStore::new();
        store.record_success("first", "f", 1);
        store.record_success("second", "s", 1);

        let board = store.leaderboard(10);
        assert_eq!(board[0].user_id, "first");
        assert_eq!(board[1].user_id, "second");
    }

    #[test]
    fn test_leaderboard_truncates() {
        let store = UserStore::new();
        for i in 0..10 {
            store.record_success(&format!("u{i}"), "x", 1);
        }
        assert_eq!(store.leaderboard(3).len(), 3);
        assert_eq!(store.user_count(), 10);
    }

    #[test]
    fn test_vote_credits() {
        let store = UserStore::new();
        store.record_vote_cast("u1", "alice");
        store.record_vote_won("u1", 5);
        // Vote credit for a user with no record is a no-op, not a crash.
        store.record_vote_won("ghost", 5);

        let stats = store.get_stats("u1").unwrap();
        assert_eq!(stats.votes_cast, 1);
        assert_eq!(stats.votes_won, 1);
        assert_eq!(stats.points, 5);
        assert_eq!(stats.command_count, 0);
        assert!(store.get_stats("ghost").is_none());
    }

    #[test]
    fn test_ranks() {
        assert_eq!(rank_for(0), "Lurker");
        assert_eq!(rank_for(9), "Lurker");
        assert_eq!(rank_for(10), "Noob");
        assert_eq!(rank_for(400), "Sysadmin");
        assert_eq!(rank_for(99999), "Root");
    }
}
