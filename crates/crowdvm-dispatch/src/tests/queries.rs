//! Query commands and moderation. Queries are answered in place and
//! never enter the queue.

use super::harness::{test_config, TestBot};

#[tokio::test(start_paused = true)]
async fn test_stats_before_any_success() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!stats").await;
    bot.expect_reply("no commands executed yet").await;
    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stats_after_success() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!scroll 1").await;
    bot.expect_reply("scrolled 1").await;

    bot.send("u1", "!stats").await;
    bot.expect_reply("Commands: 1").await;
    bot.expect_reply("Rank: Lurker").await;
    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_leaderboard_ranks_by_command_count() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!scroll 1").await;
    bot.send("u1", "!scroll 2").await;
    bot.send("u2", "!scroll 3").await;
    bot.expect_reply("scrolled 3").await;
    // Wait for all three successes to land in the store.
    for _ in 0..200 {
        if bot
            .users
            .get_stats("u1")
            .is_some_and(|s| s.command_count == 2)
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    bot.send("u3", "!leaderboard").await;
    bot.expect_reply("#1 u1: 2").await;
    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_uptime_reply() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!uptime").await;
    bot.expect_reply("uptime: 00:00:0").await;
    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_help_listing_and_topic() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!help").await;
    bot.expect_reply("!move").await;

    bot.send("u2", "!help drag").await;
    bot.expect_reply("!drag <dx> <dy> [button]").await;
    bot.shutdown().await;
}

/// Queries are answered even when the queue is never drained.
#[tokio::test(start_paused = true)]
async fn test_queries_bypass_the_queue() {
    let bot = TestBot::start_without_executor(test_config());

    bot.send("u1", "!help").await;
    assert_eq!(bot.channel.replies_containing("!move"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ban_suppresses_and_unban_restores() {
    let bot = TestBot::start(test_config());

    bot.send_admin("boss", "!ban troll").await;
    bot.expect_reply("banned from commands").await;

    bot.send("troll", "!scroll 1").await;
    bot.settle().await;
    assert!(bot.surface.ops().is_empty());

    bot.send_admin("boss", "!unban troll").await;
    bot.send("troll", "!scroll 2").await;
    bot.expect_reply("scrolled 2").await;
    assert_eq!(bot.surface.ops(), vec!["scroll 2"]);
    bot.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ban_requires_admin() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!ban victim").await;
    bot.expect_reply("restricted to admins").await;

    // The target is not banned.
    bot.send("victim", "!scroll 1").await;
    bot.expect_reply("scrolled 1").await;
    bot.shutdown().await;
}

/// Admin status can come from the configured id set, not just channel
/// badges.
#[tokio::test(start_paused = true)]
async fn test_configured_admin_ids_are_honored() {
    let mut config = test_config();
    config.admin_user_ids.push("oper-1".to_string());
    let bot = TestBot::start(config);

    // A plain (non-badged) message from the configured id passes the
    // admin check.
    bot.send("oper-1", "!startvm").await;
    bot.expect_reply("VM started").await;
    assert_eq!(bot.surface.ops(), vec!["start"]);
    bot.shutdown().await;
}
