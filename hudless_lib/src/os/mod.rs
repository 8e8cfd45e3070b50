//! macOS implementation of the platform seam.

mod coreaudio;
mod displayservices;
mod notifications;
mod tap;

use crate::error::SessionError;
use crate::filter::SignalFilter;
use crate::platform::{AudioBackend, BrightnessBackend, Platform, Subscription, TapHandle};
use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::{CFString, CFStringRef};
use std::sync::Arc;
use tracing::{debug, info};

pub use coreaudio::MacAudio;
pub use displayservices::DisplayServices;

const SCREEN_PARAMETERS_CHANGED: &str = "NSApplicationDidChangeScreenParametersNotification";

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    static kAXTrustedCheckOptionPrompt: CFStringRef;
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
}

pub struct MacPlatform {
    audio: Arc<MacAudio>,
}

impl MacPlatform {
    pub fn new() -> MacPlatform {
        MacPlatform {
            audio: Arc::new(MacAudio),
        }
    }
}

impl Default for MacPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MacPlatform {
    fn is_trusted(&self) -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    fn request_trust(&self) {
        let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
        let options = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
        let trusted = unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) };
        info!(trusted, "requested accessibility trust");
    }

    fn audio(&self) -> Arc<dyn AudioBackend> {
        self.audio.clone()
    }

    fn probe_brightness(&self) -> Option<Box<dyn BrightnessBackend>> {
        let services = DisplayServices::load()?;
        debug!("DisplayServices bound");
        Some(Box::new(services))
    }

    fn install_tap(&self, filter: SignalFilter) -> Result<Box<dyn TapHandle>, SessionError> {
        let tap = tap::EventTap::spawn(filter)?;
        Ok(Box::new(tap))
    }

    fn watch_displays(&self, on_change: Box<dyn Fn() + 'static>) -> Option<Subscription> {
        let observer = notifications::add_observer(SCREEN_PARAMETERS_CHANGED, on_change);
        Some(Subscription::new(move || notifications::remove_observer(observer)))
    }
}
