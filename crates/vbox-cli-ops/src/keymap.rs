//! PC scancode tables for keyboard injection via `keyboardputscancode`.
//!
//! Each named key maps to a (press, release) scancode sequence pair.
//! Extended keys carry the `e0` prefix on both edges.

/// Named keys and their press/release scancode sequences.
pub(crate) const SCANCODES: &[(&str, &str, &str)] = &[
    ("enter", "1c", "9c"),
    ("return", "1c", "9c"),
    ("space", "39", "b9"),
    ("backspace", "0e", "8e"),
    ("tab", "0f", "8f"),
    ("escape", "01", "81"),
    ("esc", "01", "81"),
    ("up", "e0 48", "e0 c8"),
    ("down", "e0 50", "e0 d0"),
    ("left", "e0 4b", "e0 cb"),
    ("right", "e0 4d", "e0 cd"),
    ("ctrl", "1d", "9d"),
    ("shift", "2a", "aa"),
    ("alt", "38", "b8"),
    ("delete", "e0 53", "e0 d3"),
    ("home", "e0 47", "e0 c7"),
    ("end", "e0 4f", "e0 cf"),
    ("pageup", "e0 49", "e0 c9"),
    ("pagedown", "e0 51", "e0 d1"),
    ("f1", "3b", "bb"),
    ("f2", "3c", "bc"),
    ("f3", "3d", "bd"),
    ("f4", "3e", "be"),
    ("f5", "3f", "bf"),
    ("f6", "40", "c0"),
    ("f7", "41", "c1"),
    ("f8", "42", "c2"),
    ("f9", "43", "c3"),
    ("f10", "44", "c4"),
    ("f11", "57", "d7"),
    ("f12", "58", "d8"),
    ("insert", "e0 52", "e0 d2"),
    ("printscreen", "e0 37", "e0 b7"),
];

/// Press/release scancodes for a named key.
pub(crate) fn scancodes_for(name: &str) -> Option<(&'static str, &'static str)> {
    SCANCODES
        .iter()
        .find(|(key, _, _)| *key == name)
        .map(|(_, press, release)| (*press, *release))
}

/// Lowercase ASCII to press scancode (US layout). Release code is
/// press + 0x80.
pub(crate) fn ascii_scancode(c: char) -> Option<u8> {
    let code = match c {
        'a' => 0x1e,
        'b' => 0x30,
        'c' => 0x2e,
        'd' => 0x20,
        'e' => 0x12,
        'f' => 0x21,
        'g' => 0x22,
        'h' => 0x23,
        'i' => 0x17,
        'j' => 0x24,
        'k' => 0x25,
        'l' => 0x26,
        'm' => 0x32,
        'n' => 0x31,
        'o' => 0x18,
        'p' => 0x19,
        'q' => 0x10,
        'r' => 0x13,
        's' => 0x1f,
        't' => 0x14,
        'u' => 0x16,
        'v' => 0x2f,
        'w' => 0x11,
        'x' => 0x2d,
        'y' => 0x15,
        'z' => 0x2c,
        '0' => 0x0b,
        '1' => 0x02,
        '2' => 0x03,
        '3' => 0x04,
        '4' => 0x05,
        '5' => 0x06,
        '6' => 0x07,
        '7' => 0x08,
        '8' => 0x09,
        '9' => 0x0a,
        ' ' => 0x39,
        '-' => 0x0c,
        '=' => 0x0d,
        '[' => 0x1a,
        ']' => 0x1b,
        '\\' => 0x2b,
        ';' => 0x27,
        '\'' => 0x28,
        '`' => 0x29,
        ',' => 0x33,
        '.' => 0x34,
        '/' => 0x35,
        _ => return None,
    };
    Some(code)
}

/// For characters reached through Shift, the base character to type.
pub(crate) fn shifted_base(c: char) -> Option<char> {
    if c.is_ascii_uppercase() {
        return Some(c.to_ascii_lowercase());
    }
    let base = match c {
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '~' => '`',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        _ => return None,
    };
    Some(base)
}
