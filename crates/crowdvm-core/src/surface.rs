//! The Control Surface seam: input injection and power control for the
//! shared actuator.
//!
//! The surface accepts exactly one logical operator. The executor is the
//! only caller at runtime; interleaved calls from multiple tasks would
//! corrupt the target's observed state.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Mouse buttons understood by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Parse a user-supplied button name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control surface error type.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The actuator is not running; non-power operations cannot proceed.
    /// The executor treats this as recoverable (start, retry once).
    #[error("VM is not running")]
    NotRunning,

    /// The underlying call exceeded its time budget.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A key name outside the supported set.
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// The actuator reported a failure.
    #[error("Control command failed: {0}")]
    Command(String),

    /// IO error spawning or talking to the actuator.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for control surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Abstraction over the external actuator.
///
/// Every method may fail or time out; callers bound each invocation with
/// a per-call timeout and classify the error.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    /// Move the pointer by a relative delta.
    async fn mouse_move(&self, dx: i32, dy: i32) -> SurfaceResult<()>;

    /// Move the pointer to an absolute position.
    async fn mouse_abs(&self, x: i32, y: i32) -> SurfaceResult<()>;

    /// Click a button at the current position.
    async fn click(&self, button: MouseButton) -> SurfaceResult<()>;

    /// Press, move by a delta, release.
    async fn drag(&self, dx: i32, dy: i32, button: MouseButton) -> SurfaceResult<()>;

    /// Scroll the wheel by a signed amount.
    async fn scroll(&self, amount: i32) -> SurfaceResult<()>;

    /// Type a string of text.
    async fn type_text(&self, text: &str) -> SurfaceResult<()>;

    /// Press and release a named key, holding for `hold`.
    async fn key_press(&self, name: &str, hold: Duration) -> SurfaceResult<()>;

    /// Press a chord of named keys together, release in reverse order.
    async fn key_combo(&self, names: &[String]) -> SurfaceResult<()>;

    /// Press (and keep holding) a named key.
    async fn key_down(&self, name: &str) -> SurfaceResult<()>;

    /// Release a previously held key.
    async fn key_up(&self, name: &str) -> SurfaceResult<()>;

    /// Idle for the given duration without touching the actuator.
    async fn wait(&self, duration: Duration) -> SurfaceResult<()>;

    /// Whether the actuator is currently running.
    async fn query_running(&self) -> SurfaceResult<bool>;

    /// Start the actuator. Idempotent when already running.
    async fn start(&self) -> SurfaceResult<()>;

    /// Graceful power-off (ACPI).
    async fn power_off(&self) -> SurfaceResult<()>;

    /// Hard power-off.
    async fn force_reset(&self) -> SurfaceResult<()>;

    /// Restore the configured baseline snapshot.
    async fn revert_to_baseline(&self) -> SurfaceResult<()>;
}
