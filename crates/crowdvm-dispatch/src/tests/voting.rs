//! Vote gate behavior end to end.

use super::harness::{test_config, TestBot};
use std::time::Duration;

/// Three distinct voters within the window: the session passes and the
/// gated command is enqueued exactly once.
#[tokio::test(start_paused = true)]
async fn test_quorum_passes_and_executes_once() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!vote shutdown").await;
    bot.expect_reply("Vote opened").await;

    tokio::time::advance(Duration::from_secs(5)).await;
    bot.send("u2", "!vote shutdown").await;
    tokio::time::advance(Duration::from_secs(5)).await;
    bot.send("u3", "!vote shutdown").await;
    bot.expect_reply("Vote passed").await;

    // Graceful power cycle: ACPI off, settle, start — once.
    bot.settle().await;
    tokio::time::advance(Duration::from_secs(13)).await;
    bot.expect_reply("shut down and restarted").await;
    assert_eq!(bot.surface.ops(), vec!["power_off", "wait 12", "start"]);

    // Every voter gets the win credited.
    for user in ["u1", "u2", "u3"] {
        assert_eq!(bot.users.get_stats(user).unwrap().votes_won, 1);
    }

    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_vote_counts_once() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!vote shutdown").await;
    bot.send("u1", "!vote shutdown").await;
    bot.expect_reply("already counted (1/3)").await;

    bot.send("u2", "!vote shutdown").await;
    bot.send("u3", "!vote shutdown").await;
    bot.expect_reply("Vote passed").await;
    bot.shutdown().await;
}

/// A vote for a different gated command while a session is open is
/// rejected and does not disturb the session.
#[tokio::test(start_paused = true)]
async fn test_conflicting_vote_is_rejected() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!vote shutdown").await;
    bot.send("u2", "!vote forceshutdown").await;
    bot.expect_reply("already in progress").await;

    // The session still belongs to !shutdown and still passes.
    bot.send("u2", "!vote shutdown").await;
    bot.send("u3", "!vote shutdown").await;
    bot.expect_reply("Vote passed").await;
    bot.shutdown().await;
}

/// Quorum not reached before the deadline: the vote fails, nothing is
/// enqueued, and the gate returns to idle.
#[tokio::test(start_paused = true)]
async fn test_expiry_fails_the_vote() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!vote shutdown").await;
    bot.send("u2", "!vote shutdown").await;

    tokio::time::advance(Duration::from_secs(21)).await;
    bot.expect_reply("failed: 2/3").await;

    bot.settle().await;
    assert!(bot.surface.ops().is_empty());

    // Gate is idle again: a new vote opens cleanly.
    bot.send("u4", "!vote forceshutdown").await;
    bot.expect_reply("Vote opened on !forceshutdown").await;
    bot.shutdown().await;
}

/// `!vote forceshutdown` resolves to a hard reset of the VM.
#[tokio::test(start_paused = true)]
async fn test_forceshutdown_hard_resets() {
    let mut config = test_config();
    config.vote_quorum = 1;
    let bot = TestBot::start(config);

    bot.send("u1", "!vote forceshutdown").await;
    bot.expect_reply("Vote passed").await;
    bot.expect_reply("hard-reset").await;

    assert_eq!(bot.surface.ops(), vec!["force_reset"]);
    bot.shutdown().await;
}

/// Naming a gated command directly cannot bypass the gate; it opens a
/// vote like any other.
#[tokio::test(start_paused = true)]
async fn test_bare_gated_command_opens_vote() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!shutdown").await;
    bot.expect_reply("Vote opened on !shutdown").await;

    bot.settle().await;
    assert!(bot.surface.ops().is_empty());
    bot.shutdown().await;
}

/// Vote casts are tallied in user stats.
#[tokio::test(start_paused = true)]
async fn test_votes_cast_are_tallied() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!vote shutdown").await;
    bot.send("u2", "!vote shutdown").await;
    bot.send("u2", "!vote shutdown").await; // duplicate, not tallied

    bot.settle().await;
    assert_eq!(bot.users.get_stats("u1").unwrap().votes_cast, 1);
    assert_eq!(bot.users.get_stats("u2").unwrap().votes_cast, 1);
    bot.shutdown().await;
}
