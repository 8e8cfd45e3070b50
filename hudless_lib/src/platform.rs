//! The seam between the interception core and the operating system.

use crate::error::SessionError;
use crate::filter::SignalFilter;
use std::sync::Arc;

pub type DeviceId = u32;
pub type DisplayId = u32;

/// Default output device volume and mute, levels in `[0, 1]`.
pub trait AudioBackend: Send + Sync {
    fn default_output_device(&self) -> Option<DeviceId>;
    fn volume(&self, device: DeviceId) -> Option<f32>;
    /// Returns the level the device reports after the write.
    fn set_volume(&self, device: DeviceId, value: f32) -> Option<f32>;
    fn is_muted(&self, device: DeviceId) -> Option<bool>;
    fn set_muted(&self, device: DeviceId, muted: bool) -> bool;
}

/// Capabilities bound from the display-control library. Only exists after a
/// successful probe.
pub trait BrightnessBackend {
    fn builtin_display(&self) -> Option<DisplayId>;
    fn can_change_brightness(&self, display: DisplayId) -> bool;
    fn brightness(&self, display: DisplayId) -> Option<f32>;
    /// Returns the level the display reports after the write.
    fn set_brightness(&self, display: DisplayId, value: f32) -> Option<f32>;
}

/// A live event tap. Dropping it tears the tap down.
pub trait TapHandle {
    fn reenable(&self);
}

/// Runs the wrapped closure once when dropped.
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Subscription {
        Subscription(Some(Box::new(cancel)))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

pub trait Platform {
    /// Whether the process is trusted for global input monitoring.
    fn is_trusted(&self) -> bool;
    /// May show the OS consent prompt. The result is observed by re-querying.
    fn request_trust(&self);
    fn audio(&self) -> Arc<dyn AudioBackend>;
    fn probe_brightness(&self) -> Option<Box<dyn BrightnessBackend>>;
    /// Installs the system-wide tap for system-defined events. On error no
    /// resources may remain held.
    fn install_tap(&self, filter: SignalFilter) -> Result<Box<dyn TapHandle>, SessionError>;
    /// Calls `on_change` on the main context after each display reconfiguration.
    fn watch_displays(&self, on_change: Box<dyn Fn() + 'static>) -> Option<Subscription>;
}
