//! Chat reply formatting.

use command_grammar::GatedCommand;
use std::time::Duration;
use user_store::UserStats;

/// `HH:MM:SS` for uptime replies.
pub(crate) fn format_hms(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

pub(crate) fn format_stats(stats: &UserStats) -> String {
    format!(
        "📊 @{} | Rank: {} | Points: {} | Commands: {} | Votes: {} (won: {})",
        stats.display_name,
        stats.rank(),
        stats.points,
        stats.command_count,
        stats.votes_cast,
        stats.votes_won,
    )
}

pub(crate) fn format_leaderboard(board: &[UserStats]) -> String {
    if board.is_empty() {
        return "🏆 Leaderboard is empty!".to_string();
    }
    let entries: Vec<String> = board
        .iter()
        .enumerate()
        .map(|(i, u)| format!("#{} {}: {}", i + 1, u.display_name, u.command_count))
        .collect();
    format!("🏆 Top users: {}", entries.join(" | "))
}

pub(crate) fn vote_opened(target: GatedCommand, quorum: usize, duration: Duration) -> String {
    format!(
        "🗳️ Vote opened on !{target} — {quorum} votes needed within {}s. Type !vote {target} to join!",
        duration.as_secs()
    )
}

pub(crate) fn vote_counted(target: GatedCommand, votes: usize, quorum: usize, remaining: Duration) -> String {
    format!(
        "✅ voted !{target} ({votes}/{quorum}, {}s left)",
        remaining.as_secs()
    )
}

pub(crate) fn vote_already_counted(target: GatedCommand, votes: usize, quorum: usize) -> String {
    format!("your vote on !{target} is already counted ({votes}/{quorum})")
}

pub(crate) fn vote_passed(target: GatedCommand, votes: usize) -> String {
    format!("🗳️ Vote passed with {votes} votes! !{target} is queued. 🎉")
}

pub(crate) fn vote_passed_not_admitted(target: GatedCommand) -> String {
    format!("🗳️ Vote on !{target} passed, but the command queue is full — not executed.")
}

pub(crate) fn vote_expired(target: GatedCommand, votes: usize, quorum: usize) -> String {
    format!("🗳️ Vote on !{target} failed: {votes}/{quorum} votes before time ran out.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(3661)), "01:01:01");
        assert_eq!(format_hms(Duration::from_secs(86400)), "24:00:00");
    }

    #[test]
    fn test_format_leaderboard_empty() {
        assert!(format_leaderboard(&[]).contains("empty"));
    }
}
