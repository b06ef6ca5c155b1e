//! Strict FIFO execution order.

use super::harness::{test_config, TestBot};

/// Items enqueued A, B, C execute A, B, C.
#[tokio::test(start_paused = true)]
async fn test_fifo_order() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!scroll 1").await;
    bot.send("u2", "!scroll 2").await;
    bot.send("u3", "!scroll 3").await;
    bot.expect_reply("scrolled 3").await;

    assert_eq!(bot.surface.ops(), vec!["scroll 1", "scroll 2", "scroll 3"]);
    bot.shutdown().await;
}

/// Order holds across command kinds and issuers under a burst.
#[tokio::test(start_paused = true)]
async fn test_fifo_order_under_burst() {
    let bot = TestBot::start(test_config());

    let mut expected = Vec::new();
    for i in 0..20 {
        let (text, op) = match i % 3 {
            0 => (format!("!scroll {}", (i % 10) + 1), format!("scroll {}", (i % 10) + 1)),
            1 => (format!("!move {i} {i}"), format!("move {i} {i}")),
            _ => ("!click".to_string(), "click left".to_string()),
        };
        bot.send(&format!("user-{i}"), &text).await;
        expected.push(op);
    }

    // Wait until the tail command has executed.
    for _ in 0..500 {
        if bot.surface.ops().len() == expected.len() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(bot.surface.ops(), expected);
    bot.shutdown().await;
}

/// The executor processes one item at a time: a slow command fully
/// finishes before the next starts.
#[tokio::test(start_paused = true)]
async fn test_single_inflight_item() {
    let bot = TestBot::start(test_config());

    bot.send("u1", "!wait 5").await;
    bot.send("u2", "!scroll 2").await;

    // Let the executor pick up the wait command.
    bot.settle().await;
    assert_eq!(bot.surface.ops(), vec!["wait 5"]);

    // Only after the wait elapses does the scroll run.
    tokio::time::advance(std::time::Duration::from_secs(6)).await;
    bot.expect_reply("scrolled 2").await;
    assert_eq!(bot.surface.ops(), vec!["wait 5", "scroll 2"]);

    bot.shutdown().await;
}
