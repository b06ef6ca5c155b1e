//! The static command spec table.

use crowdvm_core::Config;
use std::collections::HashMap;

/// Key names accepted by `key`, `combo`, `keydown`, and `keyup`. This is
/// the declared enum set; the control surface maps each name to its
/// scancode pair.
pub const KEY_NAMES: &[&str] = &[
    "enter",
    "return",
    "space",
    "backspace",
    "tab",
    "escape",
    "esc",
    "up",
    "down",
    "left",
    "right",
    "ctrl",
    "shift",
    "alt",
    "delete",
    "home",
    "end",
    "pageup",
    "pagedown",
    "f1",
    "f2",
    "f3",
    "f4",
    "f5",
    "f6",
    "f7",
    "f8",
    "f9",
    "f10",
    "f11",
    "f12",
    "insert",
    "printscreen",
];

/// Declarative rule set for one command name. Static apart from the
/// bounds, which come from configuration.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    /// Requires a passed vote before execution.
    pub gated: bool,
    /// Requires the issuer to be an admin.
    pub admin_only: bool,
}

const fn spec(
    name: &'static str,
    usage: &'static str,
    description: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        description,
        gated: false,
        admin_only: false,
    }
}

const fn admin_spec(
    name: &'static str,
    usage: &'static str,
    description: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        description,
        gated: false,
        admin_only: true,
    }
}

const fn gated_spec(
    name: &'static str,
    usage: &'static str,
    description: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        description,
        gated: true,
        admin_only: false,
    }
}

/// Every command the daemon understands, in help-listing order.
pub(crate) const COMMAND_SPECS: &[CommandSpec] = &[
    // Mouse
    spec(
        "move",
        "!move <dx> <dy> | !move <left|right|up|down> [steps]",
        "Move the mouse; directional steps are 100px each, max 10",
    ),
    spec("abs", "!abs <x> <y>", "Move the mouse to an absolute position"),
    spec(
        "click",
        "!click [left|right|middle]",
        "Click a mouse button (default left)",
    ),
    spec("rclick", "!rclick", "Right click"),
    spec(
        "drag",
        "!drag <dx> <dy> [button]",
        "Drag with a button held (default left)",
    ),
    spec("scroll", "!scroll <amount>", "Scroll the wheel, -10..10"),
    // Keyboard
    spec("type", "!type <text>", "Type text into the VM"),
    spec("send", "!send <text>", "Type text, then press Enter"),
    spec("enter", "!enter", "Press Enter"),
    spec(
        "key",
        "!key <name> [hold_secs]",
        "Press a named key, optionally held 0.05-2s",
    ),
    spec("combo", "!combo <name+name...>", "Press a key chord, e.g. ctrl+alt+del"),
    spec("keydown", "!keydown <name>", "Hold a key down"),
    spec("keyup", "!keyup <name>", "Release a held key"),
    // Utility
    spec("wait", "!wait <seconds>", "Pause command execution"),
    spec("stats", "!stats", "Your stats"),
    spec("leaderboard", "!leaderboard", "Top users"),
    spec("uptime", "!uptime", "Daemon uptime"),
    spec("help", "!help [command]", "List commands or describe one"),
    spec(
        "vote",
        "!vote <shutdown|forceshutdown>",
        "Open or join a vote on a gated command",
    ),
    // Gated (executed only through a passed vote)
    gated_spec("shutdown", "!vote shutdown", "Graceful shutdown + restart (vote)"),
    gated_spec(
        "forceshutdown",
        "!vote forceshutdown",
        "Hard power off + restart (vote)",
    ),
    // Admin
    admin_spec("startvm", "!startvm", "Start the VM"),
    admin_spec("reset", "!reset", "Hard reset the VM"),
    admin_spec("revert", "!revert", "Restore the baseline snapshot"),
    admin_spec("ban", "!ban <user_id>", "Bar a user from commands"),
    admin_spec("unban", "!unban <user_id>", "Lift a ban"),
];

/// Configuration-supplied bounds consulted during validation.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub type_max_length: usize,
    pub mouse_max_delta: i32,
    pub mouse_abs_x_max: i32,
    pub mouse_abs_y_max: i32,
    pub max_wait_seconds: u64,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            type_max_length: config.type_max_length,
            mouse_max_delta: config.mouse_max_delta,
            mouse_abs_x_max: config.mouse_abs_x_max,
            mouse_abs_y_max: config.mouse_abs_y_max,
            max_wait_seconds: config.max_wait_seconds,
        }
    }
}

/// Name -> spec lookup plus the bounds the parser validates against.
/// Built once at startup; never mutated.
pub struct CommandTable {
    by_name: HashMap<&'static str, &'static CommandSpec>,
    limits: Limits,
}

impl CommandTable {
    /// Build the table with the given bounds.
    pub fn new(limits: Limits) -> Self {
        let mut by_name = HashMap::with_capacity(COMMAND_SPECS.len());
        for spec in COMMAND_SPECS {
            by_name.insert(spec.name, spec);
        }
        Self { by_name, limits }
    }

    /// Build the table from the daemon configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Limits::from(config))
    }

    /// Case-insensitive spec lookup.
    pub fn get(&self, name: &str) -> Option<&'static CommandSpec> {
        self.by_name.get(name.to_ascii_lowercase().as_str()).copied()
    }

    pub(crate) fn limits(&self) -> &Limits {
        &self.limits
    }

    /// One-line help: either the full command listing or a single
    /// command's usage.
    pub fn help_text(&self, topic: Option<&str>) -> String {
        if let Some(topic) = topic {
            let name = topic.trim_start_matches('!');
            return match self.get(name) {
                Some(spec) => format!("{} - {}", spec.usage, spec.description),
                None => format!("Unknown command: {name}"),
            };
        }

        let instant: Vec<&str> = COMMAND_SPECS
            .iter()
            .filter(|s| !s.gated && !s.admin_only && s.name != "vote")
            .map(|s| s.name)
            .collect();
        let gated: Vec<&str> = COMMAND_SPECS
            .iter()
            .filter(|s| s.gated)
            .map(|s| s.name)
            .collect();

        format!(
            "Commands: !{} | Vote needed: !vote {} | !help <cmd> for details",
            instant.join(" !"),
            gated.join(" / ")
        )
    }
}
