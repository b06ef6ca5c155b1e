//! Parser error types.

use thiserror::Error;

/// Why a message was rejected at the parse stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No command with that name exists.
    #[error("Unknown command: !{0}")]
    UnknownCommand(String),

    /// An argument failed type/range/enum/length validation.
    #[error("Invalid argument '{param}': {reason}")]
    InvalidArgument {
        /// The offending parameter, by name.
        param: &'static str,
        reason: String,
    },

    /// The command is admin-only and the issuer is not an admin.
    #[error("!{0} is restricted to admins")]
    NotAuthorized(String),
}

impl ParseError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }
}

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;
