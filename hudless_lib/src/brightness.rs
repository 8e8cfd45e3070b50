use crate::error::{ChannelError, Control};
use crate::level::{step_and_verify, StepError};
use crate::platform::BrightnessBackend;
use tracing::debug;

/// Stepped brightness control of the built-in display, wrapping a probed
/// display-control library.
pub struct BrightnessControl {
    backend: Box<dyn BrightnessBackend>,
}

impl BrightnessControl {
    pub fn new(backend: Box<dyn BrightnessBackend>) -> BrightnessControl {
        BrightnessControl { backend }
    }

    pub fn adjust(&self, delta: f32) -> Result<f32, ChannelError> {
        let display_id = self.backend.builtin_display().ok_or(ChannelError::NoBuiltinDisplay)?;
        if !self.backend.can_change_brightness(display_id) {
            return Err(ChannelError::DisplayNotAdjustable);
        }
        let current = self
            .backend
            .brightness(display_id)
            .ok_or(ChannelError::DeviceReadFailed(Control::Brightness))?;

        let level = step_and_verify(current, delta, |expected| self.backend.set_brightness(display_id, expected))
            .map_err(|err| match err {
                StepError::WriteFailed => ChannelError::DeviceWriteFailed(Control::Brightness),
                StepError::NoEffect => ChannelError::VerificationFailed(Control::Brightness),
            })?;
        debug!(display_id, current, delta, level, "brightness adjusted");
        Ok(level)
    }
}
