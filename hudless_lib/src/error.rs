use crate::keys::Channel;

/// Failures that keep an interception session from starting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("permission not granted")]
    PermissionDenied,
    #[error("failed to install event tap: {0}")]
    HookInstallFailed(String),
    #[error("failed to register event tap on run loop: {0}")]
    RunLoopRegistrationFailed(String),
}

/// Channel-local failures. Each one latches exactly one channel off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("cannot get audio device")]
    DeviceUnavailable,
    #[error("cannot read {0}")]
    DeviceReadFailed(Control),
    #[error("cannot set {0}")]
    DeviceWriteFailed(Control),
    #[error("{0} change did not take effect")]
    VerificationFailed(Control),
    #[error("brightness control library unavailable")]
    BrightnessLibraryUnavailable,
    #[error("no built-in display")]
    NoBuiltinDisplay,
    #[error("built-in display brightness cannot be changed")]
    DisplayNotAdjustable,
}

/// The property a read/write/verify failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Volume,
    Mute,
    Brightness,
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Control::Volume => "volume",
            Control::Mute => "mute state",
            Control::Brightness => "brightness",
        })
    }
}

impl ChannelError {
    pub fn channel(self) -> Channel {
        match self {
            ChannelError::DeviceUnavailable => Channel::Volume,
            ChannelError::DeviceReadFailed(c) | ChannelError::DeviceWriteFailed(c) | ChannelError::VerificationFailed(c) => {
                match c {
                    Control::Volume | Control::Mute => Channel::Volume,
                    Control::Brightness => Channel::Brightness,
                }
            }
            ChannelError::BrightnessLibraryUnavailable
            | ChannelError::NoBuiltinDisplay
            | ChannelError::DisplayNotAdjustable => Channel::Brightness,
        }
    }
}
