//! System-wide media key interception: volume, mute and brightness keys are
//! applied directly and swallowed so the system overlay never shows, with a
//! per-channel failsafe that hands keys back to the OS as soon as the
//! substitute stops working.

pub mod brightness;
pub mod error;
pub mod failsafe;
pub mod filter;
pub mod interceptor;
pub mod keys;
pub mod level;
pub mod monitor;
pub mod platform;
pub mod queue;
pub mod volume;

#[cfg(target_os = "macos")]
pub mod os;

#[cfg(test)]
mod mock;

pub use error::{ChannelError, SessionError};
pub use failsafe::ChannelState;
pub use interceptor::Interceptor;
pub use keys::{Channel, KeyAction};
pub use queue::TaskQueue;
