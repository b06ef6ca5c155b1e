//! Command table, parser, and validation for chat commands.
//!
//! Parsing is pure: raw text plus an issuer identity goes in, a typed
//! [`ParsedCommand`] or a [`ParseError`] comes out. Nothing here touches
//! shared state. All numeric and length bounds are supplied by the
//! daemon configuration when the [`CommandTable`] is built at startup.

mod command;
mod error;
mod parser;
mod spec;

pub use command::{CommandKind, GatedCommand, Issuer, ParsedCommand};
pub use error::{ParseError, ParseResult};
pub use spec::{CommandSpec, CommandTable, Limits, KEY_NAMES};
