//! Raw chat text to validated, typed commands.

use crate::command::{CommandKind, GatedCommand, Issuer, ParsedCommand};
use crate::error::{ParseError, ParseResult};
use crate::spec::{CommandTable, KEY_NAMES};
use crowdvm_core::MouseButton;
use std::time::Duration;

/// Command marker prefix.
const PREFIX: char = '!';

/// Pixels per step for directional moves.
const DIRECTION_STEP_PX: i32 = 100;

/// Steps accepted by the directional move form.
const MAX_MOVE_STEPS: i32 = 10;

/// Wheel bound for `scroll`.
const MAX_SCROLL: i32 = 10;

/// Keys allowed in one combo.
const MAX_COMBO_KEYS: usize = 4;

/// Default and allowed range for `key` hold times.
const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(100);
const MIN_KEY_HOLD_SECS: f64 = 0.05;
const MAX_KEY_HOLD_SECS: f64 = 2.0;

impl CommandTable {
    /// Parse a chat message.
    ///
    /// Returns `None` for text that is not a command at all (no `!`
    /// prefix, or a bare `!`); such messages are ordinary chat and are
    /// ignored without a reply. Everything after the prefix either
    /// resolves to a [`ParsedCommand`] or fails with a [`ParseError`]
    /// that is reported once to the issuer.
    pub fn parse(&self, text: &str, issuer: &Issuer) -> Option<ParseResult<ParsedCommand>> {
        let text = text.trim();
        let body = text.strip_prefix(PREFIX)?.trim_start();
        let name = body.split_whitespace().next()?;

        Some(self.parse_command(text, body, name, issuer))
    }

    fn parse_command(
        &self,
        raw: &str,
        body: &str,
        name: &str,
        issuer: &Issuer,
    ) -> ParseResult<ParsedCommand> {
        let spec = self
            .get(name)
            .ok_or_else(|| ParseError::UnknownCommand(name.to_ascii_lowercase()))?;

        if spec.admin_only && !issuer.is_admin {
            return Err(ParseError::NotAuthorized(spec.name.to_string()));
        }

        let args: Vec<&str> = body.split_whitespace().skip(1).collect();
        // `type`/`send` take the remainder verbatim, internal spacing kept.
        let rest = body[name.len()..].trim();

        let kind = match spec.name {
            "move" => self.parse_move(&args)?,
            "abs" => self.parse_abs(&args)?,
            "click" => {
                require_arity(&args, 0, 1, spec.usage)?;
                let button = match args.first() {
                    Some(s) => parse_button(s)?,
                    None => MouseButton::Left,
                };
                CommandKind::Click { button }
            }
            "rclick" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Click {
                    button: MouseButton::Right,
                }
            }
            "drag" => self.parse_drag(&args)?,
            "scroll" => {
                require_arity(&args, 1, 1, spec.usage)?;
                let amount = parse_int("amount", args[0])?;
                check_range("amount", amount, -MAX_SCROLL, MAX_SCROLL)?;
                CommandKind::Scroll { amount }
            }
            "type" => CommandKind::TypeText {
                text: self.parse_text(rest)?,
            },
            "send" => CommandKind::SendText {
                text: self.parse_text(rest)?,
            },
            "enter" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::KeyPress {
                    name: "enter".to_string(),
                    hold: DEFAULT_KEY_HOLD,
                }
            }
            "key" => self.parse_key(&args)?,
            "combo" => self.parse_combo(&args)?,
            "keydown" => {
                require_arity(&args, 1, 1, spec.usage)?;
                CommandKind::KeyDown {
                    name: parse_key_name(args[0])?,
                }
            }
            "keyup" => {
                require_arity(&args, 1, 1, spec.usage)?;
                CommandKind::KeyUp {
                    name: parse_key_name(args[0])?,
                }
            }
            "wait" => {
                require_arity(&args, 1, 1, spec.usage)?;
                CommandKind::Wait {
                    duration: self.parse_wait(args[0])?,
                }
            }
            "stats" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Stats
            }
            "leaderboard" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Leaderboard
            }
            "uptime" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Uptime
            }
            "help" => {
                require_arity(&args, 0, 1, spec.usage)?;
                CommandKind::Help {
                    topic: args.first().map(|s| s.to_string()),
                }
            }
            "vote" => {
                require_arity(&args, 1, 1, spec.usage)?;
                let target = GatedCommand::parse(args[0]).ok_or_else(|| {
                    ParseError::invalid("target", "vote options: shutdown, forceshutdown")
                })?;
                CommandKind::Vote { target }
            }
            // Bare `!shutdown` / `!forceshutdown` normalize to a vote on
            // that command; the gate cannot be bypassed by naming the
            // command directly.
            "shutdown" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Vote {
                    target: GatedCommand::Shutdown,
                }
            }
            "forceshutdown" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Vote {
                    target: GatedCommand::ForceShutdown,
                }
            }
            "startvm" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::StartVm
            }
            "reset" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Reset
            }
            "revert" => {
                require_arity(&args, 0, 0, spec.usage)?;
                CommandKind::Revert
            }
            "ban" => {
                require_arity(&args, 1, 1, spec.usage)?;
                CommandKind::Ban {
                    user_id: args[0].trim_start_matches('@').to_string(),
                }
            }
            "unban" => {
                require_arity(&args, 1, 1, spec.usage)?;
                CommandKind::Unban {
                    user_id: args[0].trim_start_matches('@').to_string(),
                }
            }
            other => unreachable!("spec table entry without a parser arm: {other}"),
        };

        Ok(ParsedCommand {
            name: spec.name,
            kind,
            issuer: issuer.clone(),
            raw: raw.to_string(),
        })
    }

    fn parse_move(&self, args: &[&str]) -> ParseResult<CommandKind> {
        let max_delta = self.limits().mouse_max_delta;

        let (dir, first) = match args.first() {
            Some(s) => (direction_delta(s), *s),
            None => {
                return Err(ParseError::invalid(
                    "direction",
                    "usage: !move <dx> <dy> | !move <left|right|up|down> [steps]",
                ))
            }
        };

        if let Some((ux, uy)) = dir {
            if args.len() > 2 {
                return Err(ParseError::invalid("steps", "too many arguments"));
            }
            let steps = match args.get(1) {
                Some(s) => {
                    let steps = parse_int("steps", s)?;
                    check_range("steps", steps, 1, MAX_MOVE_STEPS)?;
                    steps
                }
                None => 1,
            };
            // The per-step delta is a derived value, not a user argument;
            // it is clamped rather than rejected.
            let dx = (ux * DIRECTION_STEP_PX * steps).clamp(-max_delta, max_delta);
            let dy = (uy * DIRECTION_STEP_PX * steps).clamp(-max_delta, max_delta);
            return Ok(CommandKind::MouseMove { dx, dy });
        }

        if args.len() != 2 {
            return Err(ParseError::invalid(
                "direction",
                format!("unknown direction '{first}'; expected left/right/up/down or <dx> <dy>"),
            ));
        }

        let dx = parse_int("dx", args[0])?;
        let dy = parse_int("dy", args[1])?;
        check_range("dx", dx, -max_delta, max_delta)?;
        check_range("dy", dy, -max_delta, max_delta)?;
        Ok(CommandKind::MouseMove { dx, dy })
    }

    fn parse_abs(&self, args: &[&str]) -> ParseResult<CommandKind> {
        require_arity(args, 2, 2, "!abs <x> <y>")?;
        let x = parse_int("x", args[0])?;
        let y = parse_int("y", args[1])?;
        check_range("x", x, 0, self.limits().mouse_abs_x_max)?;
        check_range("y", y, 0, self.limits().mouse_abs_y_max)?;
        Ok(CommandKind::MouseAbs { x, y })
    }

    fn parse_drag(&self, args: &[&str]) -> ParseResult<CommandKind> {
        require_arity(args, 2, 3, "!drag <dx> <dy> [button]")?;
        let max_delta = self.limits().mouse_max_delta;
        let dx = parse_int("dx", args[0])?;
        let dy = parse_int("dy", args[1])?;
        check_range("dx", dx, -max_delta, max_delta)?;
        check_range("dy", dy, -max_delta, max_delta)?;
        let button = match args.get(2) {
            Some(s) => parse_button(s)?,
            None => MouseButton::Left,
        };
        Ok(CommandKind::Drag { dx, dy, button })
    }

    fn parse_text(&self, rest: &str) -> ParseResult<String> {
        if rest.is_empty() {
            return Err(ParseError::invalid("text", "text is required"));
        }
        let max = self.limits().type_max_length;
        let len = rest.chars().count();
        if len > max {
            return Err(ParseError::invalid(
                "text",
                format!("{len} characters exceeds the {max} character limit"),
            ));
        }
        Ok(rest.to_string())
    }

    fn parse_key(&self, args: &[&str]) -> ParseResult<CommandKind> {
        require_arity(args, 1, 2, "!key <name> [hold_secs]")?;
        let name = parse_key_name(args[0])?;
        let hold = match args.get(1) {
            Some(s) => {
                let secs: f64 = s
                    .parse()
                    .map_err(|_| ParseError::invalid("hold_secs", format!("'{s}' is not a number")))?;
                if !secs.is_finite() || !(MIN_KEY_HOLD_SECS..=MAX_KEY_HOLD_SECS).contains(&secs) {
                    return Err(ParseError::invalid(
                        "hold_secs",
                        format!("must be between {MIN_KEY_HOLD_SECS} and {MAX_KEY_HOLD_SECS}"),
                    ));
                }
                Duration::from_secs_f64(secs)
            }
            None => DEFAULT_KEY_HOLD,
        };
        Ok(CommandKind::KeyPress { name, hold })
    }

    fn parse_combo(&self, args: &[&str]) -> ParseResult<CommandKind> {
        require_arity(args, 1, 1, "!combo <name+name...>")?;
        let parts: Vec<&str> = args[0].split('+').collect();
        if parts.len() > MAX_COMBO_KEYS {
            return Err(ParseError::invalid(
                "combo",
                format!("at most {MAX_COMBO_KEYS} keys per combo"),
            ));
        }
        let mut names = Vec::with_capacity(parts.len());
        for part in parts {
            names.push(parse_key_name(part)?);
        }
        Ok(CommandKind::KeyCombo { names })
    }

    fn parse_wait(&self, arg: &str) -> ParseResult<Duration> {
        let max = self.limits().max_wait_seconds as f64;
        let secs: f64 = arg
            .parse()
            .map_err(|_| ParseError::invalid("seconds", format!("'{arg}' is not a number")))?;
        if !secs.is_finite() || secs < 0.0 || secs > max {
            return Err(ParseError::invalid(
                "seconds",
                format!("must be between 0 and {max}"),
            ));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

fn direction_delta(s: &str) -> Option<(i32, i32)> {
    match s.to_ascii_lowercase().as_str() {
        "left" => Some((-1, 0)),
        "right" => Some((1, 0)),
        "up" => Some((0, -1)),
        "down" => Some((0, 1)),
        _ => None,
    }
}

fn parse_button(s: &str) -> ParseResult<MouseButton> {
    MouseButton::parse(s)
        .ok_or_else(|| ParseError::invalid("button", format!("'{s}' is not left/right/middle")))
}

fn parse_key_name(s: &str) -> ParseResult<String> {
    let name = s.to_ascii_lowercase();
    if name.is_empty() || !KEY_NAMES.contains(&name.as_str()) {
        return Err(ParseError::invalid("name", format!("unknown key '{s}'")));
    }
    Ok(name)
}

fn parse_int(param: &'static str, s: &str) -> ParseResult<i32> {
    s.parse::<i32>()
        .map_err(|_| ParseError::invalid(param, format!("'{s}' is not an integer")))
}

fn check_range(param: &'static str, value: i32, min: i32, max: i32) -> ParseResult<()> {
    if value < min || value > max {
        return Err(ParseError::invalid(
            param,
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}

fn require_arity(args: &[&str], min: usize, max: usize, usage: &str) -> ParseResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ParseError::invalid("args", format!("usage: {usage}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Limits;

    fn table() -> CommandTable {
        CommandTable::new(Limits {
            type_max_length: 100,
            mouse_max_delta: 300,
            mouse_abs_x_max: 1920,
            mouse_abs_y_max: 1080,
            max_wait_seconds: 10,
        })
    }

    fn viewer() -> Issuer {
        Issuer {
            user_id: "user-1".to_string(),
            display_name: "viewer".to_string(),
            is_admin: false,
        }
    }

    fn admin() -> Issuer {
        Issuer {
            user_id: "admin-1".to_string(),
            display_name: "admin".to_string(),
            is_admin: true,
        }
    }

    fn parse_ok(text: &str) -> ParsedCommand {
        table().parse(text, &viewer()).unwrap().unwrap()
    }

    fn parse_err(text: &str) -> ParseError {
        table().parse(text, &viewer()).unwrap().unwrap_err()
    }

    #[test]
    fn test_non_commands_are_ignored() {
        let table = table();
        assert!(table.parse("hello there", &viewer()).is_none());
        assert!(table.parse("", &viewer()).is_none());
        assert!(table.parse("!", &viewer()).is_none());
        assert!(table.parse("   ", &viewer()).is_none());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_err("!frobnicate"),
            ParseError::UnknownCommand("frobnicate".to_string())
        );
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let cmd = parse_ok("!CLICK right");
        assert_eq!(
            cmd.kind,
            CommandKind::Click {
                button: MouseButton::Right
            }
        );
        assert_eq!(cmd.name, "click");
    }

    #[test]
    fn test_move_numeric() {
        let cmd = parse_ok("!move 50 -80");
        assert_eq!(cmd.kind, CommandKind::MouseMove { dx: 50, dy: -80 });
    }

    #[test]
    fn test_move_numeric_out_of_bounds() {
        match parse_err("!move 301 0") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "dx"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_move_directional() {
        let cmd = parse_ok("!move left");
        assert_eq!(cmd.kind, CommandKind::MouseMove { dx: -100, dy: 0 });

        let cmd = parse_ok("!move down 2");
        assert_eq!(cmd.kind, CommandKind::MouseMove { dx: 0, dy: 200 });
    }

    #[test]
    fn test_move_directional_clamps_derived_delta() {
        // 10 steps resolve to 1000px, clamped to the configured bound.
        let cmd = parse_ok("!move right 10");
        assert_eq!(cmd.kind, CommandKind::MouseMove { dx: 300, dy: 0 });
    }

    #[test]
    fn test_move_directional_steps_out_of_range() {
        match parse_err("!move right 11") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "steps"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        match parse_err("!move right 0") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "steps"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_move_rejects_float_coordinates() {
        match parse_err("!move 10.5 3") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "dx"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_abs_bounds() {
        let cmd = parse_ok("!abs 1920 0");
        assert_eq!(cmd.kind, CommandKind::MouseAbs { x: 1920, y: 0 });

        match parse_err("!abs 1921 0") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "x"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        match parse_err("!abs 10 -1") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "y"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_click_defaults_to_left() {
        assert_eq!(
            parse_ok("!click").kind,
            CommandKind::Click {
                button: MouseButton::Left
            }
        );
    }

    #[test]
    fn test_click_bad_button_is_enum_violation() {
        match parse_err("!click side") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "button"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_rclick_normalizes_to_right_click() {
        assert_eq!(
            parse_ok("!rclick").kind,
            CommandKind::Click {
                button: MouseButton::Right
            }
        );
    }

    #[test]
    fn test_drag_with_button() {
        let cmd = parse_ok("!drag 10 20 middle");
        assert_eq!(
            cmd.kind,
            CommandKind::Drag {
                dx: 10,
                dy: 20,
                button: MouseButton::Middle
            }
        );
    }

    #[test]
    fn test_scroll_bounds() {
        assert_eq!(parse_ok("!scroll -3").kind, CommandKind::Scroll { amount: -3 });
        match parse_err("!scroll 11") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "amount"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_type_preserves_interior_spacing() {
        let cmd = parse_ok("!type pacman  -Syu   linux");
        assert_eq!(
            cmd.kind,
            CommandKind::TypeText {
                text: "pacman  -Syu   linux".to_string()
            }
        );
    }

    #[test]
    fn test_type_length_limit() {
        let ok = format!("!type {}", "a".repeat(100));
        assert!(matches!(parse_ok(&ok).kind, CommandKind::TypeText { .. }));

        let too_long = format!("!type {}", "a".repeat(101));
        match parse_err(&too_long) {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "text"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_send_requires_text() {
        match parse_err("!send") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "text"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_enter_normalizes_to_key_press() {
        assert_eq!(
            parse_ok("!enter").kind,
            CommandKind::KeyPress {
                name: "enter".to_string(),
                hold: DEFAULT_KEY_HOLD,
            }
        );
    }

    #[test]
    fn test_key_with_hold() {
        let cmd = parse_ok("!key F5 1.5");
        assert_eq!(
            cmd.kind,
            CommandKind::KeyPress {
                name: "f5".to_string(),
                hold: Duration::from_secs_f64(1.5),
            }
        );
    }

    #[test]
    fn test_key_unknown_name() {
        match parse_err("!key superkey") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "name"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_key_hold_out_of_range() {
        match parse_err("!key tab 5") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "hold_secs"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_combo() {
        let cmd = parse_ok("!combo ctrl+alt+delete");
        assert_eq!(
            cmd.kind,
            CommandKind::KeyCombo {
                names: vec!["ctrl".into(), "alt".into(), "delete".into()]
            }
        );
    }

    #[test]
    fn test_combo_too_many_keys() {
        match parse_err("!combo ctrl+alt+shift+tab+f1") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "combo"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_wait_bounds() {
        assert_eq!(
            parse_ok("!wait 2.5").kind,
            CommandKind::Wait {
                duration: Duration::from_secs_f64(2.5)
            }
        );
        match parse_err("!wait 11") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "seconds"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_vote_targets() {
        assert_eq!(
            parse_ok("!vote shutdown").kind,
            CommandKind::Vote {
                target: GatedCommand::Shutdown
            }
        );
        assert_eq!(
            parse_ok("!vote !forceshutdown").kind,
            CommandKind::Vote {
                target: GatedCommand::ForceShutdown
            }
        );
        match parse_err("!vote reboot") {
            ParseError::InvalidArgument { param, .. } => assert_eq!(param, "target"),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_gated_command_becomes_a_vote() {
        assert_eq!(
            parse_ok("!shutdown").kind,
            CommandKind::Vote {
                target: GatedCommand::Shutdown
            }
        );
    }

    #[test]
    fn test_admin_commands_require_admin() {
        assert_eq!(
            parse_err("!startvm"),
            ParseError::NotAuthorized("startvm".to_string())
        );

        let cmd = table().parse("!startvm", &admin()).unwrap().unwrap();
        assert_eq!(cmd.kind, CommandKind::StartVm);
    }

    #[test]
    fn test_ban_strips_at_sign() {
        let cmd = table().parse("!ban @troll", &admin()).unwrap().unwrap();
        assert_eq!(
            cmd.kind,
            CommandKind::Ban {
                user_id: "troll".to_string()
            }
        );
    }

    #[test]
    fn test_issuer_and_raw_are_carried() {
        let cmd = parse_ok("!stats");
        assert_eq!(cmd.issuer.user_id, "user-1");
        assert_eq!(cmd.raw, "!stats");
        assert!(cmd.kind.is_query());
    }

    #[test]
    fn test_kind_classification() {
        assert!(parse_ok("!leaderboard").kind.is_query());
        assert!(!parse_ok("!move 1 1").kind.is_query());
        assert!(CommandKind::PowerCycle { force: true }.is_power());
        assert!(!CommandKind::Scroll { amount: 1 }.is_power());
        let ban = table().parse("!ban x", &admin()).unwrap().unwrap();
        assert!(ban.kind.is_moderation());
    }
}
