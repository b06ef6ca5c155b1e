//! Typed command payloads.

use crowdvm_core::MouseButton;
use std::time::Duration;

/// Who issued a command. Carried with the command through the pipeline so
/// outcomes can be attributed and replied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub user_id: String,
    pub display_name: String,
    pub is_admin: bool,
}

/// The two commands guarded by the vote gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedCommand {
    /// Graceful ACPI shutdown, then restart.
    Shutdown,
    /// Hard power-off, then restart.
    ForceShutdown,
}

impl GatedCommand {
    /// Parse a vote target, tolerating a leading `!`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim_start_matches('!').to_ascii_lowercase().as_str() {
            "shutdown" => Some(Self::Shutdown),
            "forceshutdown" => Some(Self::ForceShutdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::ForceShutdown => "forceshutdown",
        }
    }
}

impl std::fmt::Display for GatedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command resolved to its tagged variant with validated, normalized
/// arguments. Built once by the parser; no dynamic lookups downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Relative pointer move (directional forms are resolved to deltas).
    MouseMove { dx: i32, dy: i32 },
    /// Absolute pointer move.
    MouseAbs { x: i32, y: i32 },
    /// Button click (`rclick` normalizes to a right click).
    Click { button: MouseButton },
    /// Press, move, release.
    Drag { dx: i32, dy: i32, button: MouseButton },
    /// Wheel scroll.
    Scroll { amount: i32 },
    /// Type text.
    TypeText { text: String },
    /// Type text, then press Enter.
    SendText { text: String },
    /// Press and release a named key (`enter` normalizes here).
    KeyPress { name: String, hold: Duration },
    /// Press a chord, release in reverse.
    KeyCombo { names: Vec<String> },
    /// Hold a key down.
    KeyDown { name: String },
    /// Release a held key.
    KeyUp { name: String },
    /// Idle without touching the actuator.
    Wait { duration: Duration },
    /// Issuer's own stats.
    Stats,
    /// Top users by executed commands.
    Leaderboard,
    /// Daemon uptime.
    Uptime,
    /// Command listing or per-command help.
    Help { topic: Option<String> },
    /// Open or join a vote on a gated command.
    Vote { target: GatedCommand },
    /// Power off (gracefully unless `force`), then restart. Never
    /// produced by the parser directly; admitted by the vote coordinator
    /// when a session passes.
    PowerCycle { force: bool },
    /// Start the VM (admin).
    StartVm,
    /// Hard reset the VM (admin).
    Reset,
    /// Restore the baseline snapshot (admin).
    Revert,
    /// Bar a user id from commands (admin).
    Ban { user_id: String },
    /// Lift a ban (admin).
    Unban { user_id: String },
}

impl CommandKind {
    /// Commands answered synchronously by the dispatcher; they never
    /// enter the admission queue because they touch no actuator.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Stats | Self::Leaderboard | Self::Uptime | Self::Help { .. }
        )
    }

    /// Power-class operations. Exempt from the not-running recovery path:
    /// starting the VM to retry a power-off would be absurd.
    pub fn is_power(&self) -> bool {
        matches!(
            self,
            Self::PowerCycle { .. } | Self::StartVm | Self::Reset | Self::Revert
        )
    }

    /// Moderation commands handled inside the dispatcher.
    pub fn is_moderation(&self) -> bool {
        matches!(self, Self::Ban { .. } | Self::Unban { .. })
    }
}

/// A parsed, validated command owned by the pipeline until executed or
/// discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// Canonical command name from the spec table.
    pub name: &'static str,
    /// Typed payload.
    pub kind: CommandKind,
    /// Who issued it.
    pub issuer: Issuer,
    /// The raw text as received.
    pub raw: String,
}
