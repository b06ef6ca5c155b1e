//! Typed VBoxManage orchestration implementing the control surface.
//!
//! This crate owns process execution, timeout control, output parsing,
//! and error classification for the `VBoxManage` workflows the daemon
//! uses: machine state queries, power transitions, snapshot restore, and
//! input injection (relative/absolute pointer events, wheel, scancode
//! keyboard).

mod keymap;
mod runner;
mod surface;

pub use runner::{CommandOutput, VboxCommandRunner};
pub use surface::VboxSurface;
