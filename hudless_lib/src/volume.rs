use crate::error::{ChannelError, Control};
use crate::level::{step_and_verify, StepError};
use crate::platform::AudioBackend;
use tracing::debug;

/// Stepped volume and mute control of the current default output device.
pub struct VolumeControl<'a> {
    audio: &'a dyn AudioBackend,
}

impl<'a> VolumeControl<'a> {
    pub fn new(audio: &'a dyn AudioBackend) -> VolumeControl<'a> {
        VolumeControl { audio }
    }

    /// Moves the volume one step and returns the level the device settled on.
    pub fn adjust(&self, delta: f32) -> Result<f32, ChannelError> {
        let device = self.audio.default_output_device().ok_or(ChannelError::DeviceUnavailable)?;
        let current = self
            .audio
            .volume(device)
            .ok_or(ChannelError::DeviceReadFailed(Control::Volume))?;

        if delta != 0.0 && self.audio.is_muted(device) == Some(true) && !self.audio.set_muted(device, false) {
            debug!(device, "unmute before volume change failed; continuing");
        }

        let level = step_and_verify(current, delta, |expected| self.audio.set_volume(device, expected)).map_err(
            |err| match err {
                StepError::WriteFailed => ChannelError::DeviceWriteFailed(Control::Volume),
                StepError::NoEffect => ChannelError::VerificationFailed(Control::Volume),
            },
        )?;
        debug!(device, current, delta, level, "volume adjusted");
        Ok(level)
    }

    /// Flips mute and returns the new mute state.
    pub fn toggle_mute(&self) -> Result<bool, ChannelError> {
        let device = self.audio.default_output_device().ok_or(ChannelError::DeviceUnavailable)?;
        let muted = self
            .audio
            .is_muted(device)
            .ok_or(ChannelError::DeviceReadFailed(Control::Mute))?;
        if !self.audio.set_muted(device, !muted) {
            return Err(ChannelError::DeviceWriteFailed(Control::Mute));
        }
        debug!(device, muted = !muted, "mute toggled");
        Ok(!muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::STANDARD_STEP;
    use crate::mock::{AudioCall, MockAudio};

    #[test]
    fn steps_up_from_half() {
        let audio = MockAudio::with_volume(0.5);
        assert_eq!(VolumeControl::new(&audio).adjust(STANDARD_STEP), Ok(0.5625));
        assert_eq!(audio.volume_level(), 0.5625);
    }

    #[test]
    fn missing_device_disables_with_device_reason() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.device = None);
        let err = VolumeControl::new(&audio).adjust(STANDARD_STEP).unwrap_err();
        assert_eq!(err.to_string(), "cannot get audio device");
    }

    #[test]
    fn unreadable_volume() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.read_fails = true);
        let err = VolumeControl::new(&audio).adjust(STANDARD_STEP).unwrap_err();
        assert_eq!(err, ChannelError::DeviceReadFailed(Control::Volume));
    }

    #[test]
    fn rejected_write() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.write_fails = true);
        let err = VolumeControl::new(&audio).adjust(-STANDARD_STEP).unwrap_err();
        assert_eq!(err.to_string(), "cannot set volume");
    }

    #[test]
    fn stuck_device_fails_verification() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.ignore_writes = true);
        let err = VolumeControl::new(&audio).adjust(STANDARD_STEP).unwrap_err();
        assert_eq!(err.to_string(), "volume change did not take effect");
    }

    #[test]
    fn stuck_device_at_floor_is_not_an_error() {
        let audio = MockAudio::with_volume(0.0);
        audio.script(|s| s.ignore_writes = true);
        assert_eq!(VolumeControl::new(&audio).adjust(-STANDARD_STEP), Ok(0.0));
    }

    #[test]
    fn unmutes_before_stepping() {
        let audio = MockAudio::with_volume(0.25);
        audio.script(|s| s.muted = true);
        VolumeControl::new(&audio).adjust(STANDARD_STEP).unwrap();
        let calls = audio.calls();
        let unmute = calls.iter().position(|c| *c == AudioCall::SetMuted(false)).unwrap();
        let write = calls.iter().position(|c| matches!(c, AudioCall::SetVolume(_))).unwrap();
        assert!(unmute < write);
    }

    #[test]
    fn failed_unmute_does_not_abort_step() {
        let audio = MockAudio::with_volume(0.25);
        audio.script(|s| {
            s.muted = true;
            s.mute_write_fails = true;
        });
        assert_eq!(VolumeControl::new(&audio).adjust(STANDARD_STEP), Ok(0.3125));
    }

    #[test]
    fn toggle_mute_negates() {
        let audio = MockAudio::with_volume(0.5);
        let control = VolumeControl::new(&audio);
        assert_eq!(control.toggle_mute(), Ok(true));
        assert_eq!(control.toggle_mute(), Ok(false));
    }

    #[test]
    fn toggle_mute_read_failure() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.mute_read_fails = true);
        assert_eq!(
            VolumeControl::new(&audio).toggle_mute(),
            Err(ChannelError::DeviceReadFailed(Control::Mute))
        );
    }

    #[test]
    fn toggle_mute_write_failure() {
        let audio = MockAudio::with_volume(0.5);
        audio.script(|s| s.mute_write_fails = true);
        let err = VolumeControl::new(&audio).toggle_mute().unwrap_err();
        assert_eq!(err, ChannelError::DeviceWriteFailed(Control::Mute));
        assert_eq!(err.to_string(), "cannot set mute state");
        assert_eq!(audio.calls(), vec![AudioCall::SetMuted(true)]);
    }
}
