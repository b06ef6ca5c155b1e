//! Executor failure classification and recovery.

use super::harness::{test_config, TestBot};
use crowdvm_core::SurfaceError;

/// VM down on a non-power command: start it, retry once, succeed.
#[tokio::test(start_paused = true)]
async fn test_not_running_recovers_via_start_and_retry() {
    let bot = TestBot::start(test_config());
    bot.surface.fail_next(vec![SurfaceError::NotRunning]);

    bot.send("u1", "!click").await;
    bot.expect_reply("VM was down; started it first").await;

    assert_eq!(bot.surface.ops(), vec!["click left", "start", "click left"]);
    // The recovered command still counts as a success.
    assert_eq!(bot.users.get_stats("u1").unwrap().command_count, 1);
    bot.shutdown().await;
}

/// Retry also fails: FailedRecoverable, and the loop moves on.
#[tokio::test(start_paused = true)]
async fn test_failed_retry_is_recoverable_and_loop_continues() {
    let bot = TestBot::start(test_config());
    bot.surface.fail_next(vec![
        SurfaceError::NotRunning,
        SurfaceError::Command("input device wedged".to_string()),
    ]);

    bot.send("u1", "!click").await;
    bot.send("u2", "!scroll 2").await;

    bot.expect_reply("retry failed").await;
    bot.expect_reply("scrolled 2").await;

    assert_eq!(
        bot.surface.ops(),
        vec!["click left", "start", "click left", "scroll 2"]
    );
    // No success, no credit.
    assert!(bot.users.get_stats("u1").is_none());
    bot.shutdown().await;
}

/// The recovery start itself fails: report it, don't retry the command.
#[tokio::test(start_paused = true)]
async fn test_start_failure_reported_without_retry() {
    let bot = TestBot::start(test_config());
    bot.surface.fail_next(vec![SurfaceError::NotRunning]);
    bot.surface
        .fail_start(SurfaceError::Command("VT-x is not available".to_string()));

    bot.send("u1", "!click").await;
    bot.expect_reply("could not be started").await;

    assert_eq!(bot.surface.ops(), vec!["click left", "start"]);
    bot.shutdown().await;
}

/// Any other actuator error is fatal for that item only.
#[tokio::test(start_paused = true)]
async fn test_other_failure_is_fatal_and_loop_continues() {
    let bot = TestBot::start(test_config());
    bot.surface
        .fail_next(vec![SurfaceError::Command("boom".to_string())]);

    bot.send("u1", "!click").await;
    bot.send("u2", "!scroll 2").await;

    bot.expect_reply("!click failed").await;
    bot.expect_reply("scrolled 2").await;

    assert_eq!(bot.surface.ops(), vec!["click left", "scroll 2"]);
    bot.shutdown().await;
}

/// Power commands are exempt from not-running recovery; starting the VM
/// to power it off makes no sense.
#[tokio::test(start_paused = true)]
async fn test_power_commands_skip_recovery() {
    let bot = TestBot::start(test_config());
    bot.surface.fail_next(vec![SurfaceError::NotRunning]);

    bot.send_admin("boss", "!reset").await;
    bot.expect_reply("!reset failed").await;

    // No automatic start was attempted.
    assert_eq!(bot.surface.ops(), vec!["force_reset"]);
    bot.shutdown().await;
}

/// Successful commands credit the issuer in the user store.
#[tokio::test(start_paused = true)]
async fn test_success_credits_user() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!scroll 3").await;
    bot.expect_reply("scrolled 3").await;

    let stats = bot.users.get_stats("u1").unwrap();
    assert_eq!(stats.command_count, 1);
    assert_eq!(stats.points, 1);
    bot.shutdown().await;
}
