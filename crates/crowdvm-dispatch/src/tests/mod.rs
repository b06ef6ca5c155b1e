//! Pipeline integration tests.
//!
//! Suites:
//! - `admission` — queue capacity, rejection reporting, parse rejections
//! - `cooldown` — per-user/global gates, admin bypass, vote exemption
//! - `ordering` — strict FIFO execution
//! - `voting` — quorum, duplicates, exclusivity, expiry
//! - `recovery` — not-running recovery, fatal failures, loop survival
//! - `queries` — stats/leaderboard/uptime/help and moderation


mod ordering;
mod queries;
mod recovery;
mod voting;
