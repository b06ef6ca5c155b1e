//! Core types, configuration, and trait seams for the crowdvm daemon.
//!
//! Everything the pipeline crates share lives here: the incoming chat
//! message shape, the `ChatChannel` and `ControlSurface` collaborator
//! traits, configuration loading, filesystem paths, and logging setup.

mod channel;
mod config;
mod error;
mod logging;
mod paths;
mod surface;

pub use channel::{ChannelError, ChannelResult, ChatChannel, IncomingMessage, Visibility};
pub use config::{ChatConfig, Config, VmConfig};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
pub use surface::{ControlSurface, MouseButton, SurfaceError, SurfaceResult};
