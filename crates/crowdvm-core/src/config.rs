//! Configuration management for the daemon.
//!
//! All numeric and length bounds enforced by the command pipeline are
//! configuration-supplied and enumerated here. Loaded from
//! `~/.crowdvm/config.json`, with a small set of environment overrides.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// VM / control surface settings.
    #[serde(default)]
    pub vm: VmConfig,

    /// Chat channel settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Seconds a non-admin user must wait between accepted commands.
    #[serde(default = "default_user_cooldown")]
    pub user_cooldown_secs: f64,

    /// Seconds between any two accepted commands, across all users.
    #[serde(default = "default_command_cooldown")]
    pub command_cooldown_secs: f64,

    /// Length of the voting window for gated commands.
    #[serde(default = "default_vote_duration")]
    pub vote_duration_secs: u64,

    /// Distinct voters required to pass a gated command.
    #[serde(default = "default_vote_quorum")]
    pub vote_quorum: usize,

    /// Capacity of the admission queue.
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,

    /// Maximum characters accepted by `!type` / `!send`.
    #[serde(default = "default_type_max_length")]
    pub type_max_length: usize,

    /// Maximum pixels per relative mouse move or drag.
    #[serde(default = "default_mouse_max_delta")]
    pub mouse_max_delta: i32,

    /// Absolute pointer bounds.
    #[serde(default = "default_mouse_abs_x_max")]
    pub mouse_abs_x_max: i32,
    #[serde(default = "default_mouse_abs_y_max")]
    pub mouse_abs_y_max: i32,

    /// Maximum seconds accepted by `!wait`.
    #[serde(default = "default_max_wait")]
    pub max_wait_seconds: u64,

    /// Points awarded per successfully executed command.
    #[serde(default = "default_points_per_command")]
    pub points_per_command: u64,

    /// Points awarded to each voter on a passed vote.
    #[serde(default = "default_points_per_vote_win")]
    pub points_per_vote_win: u64,

    /// Number of entries returned by `!leaderboard`.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// User ids that bypass cooldowns and may run admin commands.
    #[serde(default)]
    pub admin_user_ids: Vec<String>,

    /// Grace period for the executor to drain the queue on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

/// VM / control surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    /// VirtualBox machine name.
    pub vm_name: String,
    /// Path to the VBoxManage executable.
    #[serde(default = "default_vboxmanage_path")]
    pub vboxmanage_path: String,
    /// Snapshot restored by `!revert`.
    #[serde(default = "default_snapshot_name")]
    pub snapshot_name: String,
    /// Per-call timeout for control surface operations, in seconds.
    #[serde(default = "default_surface_timeout")]
    pub surface_timeout_secs: u64,
}

/// Chat channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// YouTube Data API key.
    #[serde(default)]
    pub api_key: String,
    /// OAuth bearer token for reading chat and posting replies.
    /// Acquiring and refreshing this token is outside the daemon's scope.
    #[serde(default)]
    pub access_token: String,
    /// Live chat id to attach to. Auto-discovered when empty.
    #[serde(default)]
    pub live_chat_id: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_user_cooldown() -> f64 {
    3.0
}
fn default_command_cooldown() -> f64 {
    0.5
}
fn default_vote_duration() -> u64 {
    20
}
fn default_vote_quorum() -> usize {
    3
}
fn default_queue_max_size() -> usize {
    50
}
fn default_type_max_length() -> usize {
    100
}
fn default_mouse_max_delta() -> i32 {
    300
}
fn default_mouse_abs_x_max() -> i32 {
    1920
}
fn default_mouse_abs_y_max() -> i32 {
    1080
}
fn default_max_wait() -> u64 {
    10
}
fn default_points_per_command() -> u64 {
    1
}
fn default_points_per_vote_win() -> u64 {
    5
}
fn default_leaderboard_size() -> usize {
    10
}
fn default_shutdown_grace() -> u64 {
    15
}
fn default_vboxmanage_path() -> String {
    "VBoxManage".to_string()
}
fn default_snapshot_name() -> String {
    "SafeBase".to_string()
}
fn default_surface_timeout() -> u64 {
    10
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            vm_name: String::new(),
            vboxmanage_path: default_vboxmanage_path(),
            snapshot_name: default_snapshot_name(),
            surface_timeout_secs: default_surface_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            vm: VmConfig::default(),
            chat: ChatConfig::default(),
            user_cooldown_secs: default_user_cooldown(),
            command_cooldown_secs: default_command_cooldown(),
            vote_duration_secs: default_vote_duration(),
            vote_quorum: default_vote_quorum(),
            queue_max_size: default_queue_max_size(),
            type_max_length: default_type_max_length(),
            mouse_max_delta: default_mouse_max_delta(),
            mouse_abs_x_max: default_mouse_abs_x_max(),
            mouse_abs_y_max: default_mouse_abs_y_max(),
            max_wait_seconds: default_max_wait(),
            points_per_command: default_points_per_command(),
            points_per_vote_win: default_points_per_vote_win(),
            leaderboard_size: default_leaderboard_size(),
            admin_user_ids: Vec::new(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Load configuration from the standard location, falling back to
    /// defaults when no file exists yet.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the standard location.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var("CROWDVM_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(token) = std::env::var("CROWDVM_CHAT_TOKEN") {
            self.chat.access_token = token;
        }
        if let Ok(key) = std::env::var("CROWDVM_CHAT_API_KEY") {
            self.chat.api_key = key;
        }
    }

    /// Validate the configuration, collecting all problems at once.
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = Vec::new();

        if self.vm.vm_name.is_empty() {
            errors.push("vm.vm_name is required".to_string());
        }
        if self.vote_quorum == 0 {
            errors.push("vote_quorum must be at least 1".to_string());
        }
        if self.vote_duration_secs == 0 {
            errors.push("vote_duration_secs must be at least 1".to_string());
        }
        if self.queue_max_size == 0 {
            errors.push("queue_max_size must be at least 1".to_string());
        }
        if self.user_cooldown_secs < 0.0 {
            errors.push("user_cooldown_secs must not be negative".to_string());
        }
        if self.type_max_length == 0 {
            errors.push("type_max_length must be at least 1".to_string());
        }
        if self.mouse_max_delta <= 0 {
            errors.push("mouse_max_delta must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Config(errors.join("; ")))
        }
    }

    /// Per-user cooldown as a `Duration`.
    pub fn user_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.user_cooldown_secs.max(0.0))
    }

    /// Global cooldown as a `Duration`.
    pub fn command_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.command_cooldown_secs.max(0.0))
    }

    /// Voting window as a `Duration`.
    pub fn vote_duration(&self) -> Duration {
        Duration::from_secs(self.vote_duration_secs)
    }

    /// Per-call surface timeout as a `Duration`.
    pub fn surface_timeout(&self) -> Duration {
        Duration::from_secs(self.vm.surface_timeout_secs)
    }

    /// Shutdown drain grace as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Whether the given user id is in the admin set.
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.queue_max_size, 50);
        assert_eq!(config.vote_quorum, 3);
        assert_eq!(config.user_cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn test_validate_requires_vm_name() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vm.vm_name"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = Config {
            vote_quorum: 0,
            queue_max_size: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("vote_quorum"));
        assert!(err.contains("queue_max_size"));
        assert!(err.contains("vm.vm_name"));
    }

    #[test]
    fn test_load_from_file_with_partial_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"vm": {"vm_name": "ArchChaos"}, "queue_max_size": 8}"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.vm.vm_name, "ArchChaos");
        assert_eq!(config.vm.vboxmanage_path, "VBoxManage");
        assert_eq!(config.queue_max_size, 8);
        assert_eq!(config.type_max_length, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.vm.vm_name = "TestVm".to_string();
        config.admin_user_ids.push("owner-1".to_string());
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.vm.vm_name, "TestVm");
        assert!(loaded.is_admin("owner-1"));
        assert!(!loaded.is_admin("viewer-2"));
    }
}
