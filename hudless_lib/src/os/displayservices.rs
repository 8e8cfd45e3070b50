//! Runtime binding of the private DisplayServices framework.

use crate::platform::{BrightnessBackend, DisplayId};
use core_foundation::bundle::CFBundle;
use core_foundation::string::CFString;
use core_foundation::url::CFURL;
use core_graphics::display::CGDisplay;
use std::ffi::c_void;
use std::mem;
use tracing::{debug, warn};

const FRAMEWORK_PATH: &str = "/System/Library/PrivateFrameworks/DisplayServices.framework";

type CanChangeFn = unsafe extern "C" fn(display: u32) -> bool;
type GetFn = unsafe extern "C" fn(display: u32, brightness: *mut f32) -> i32;
type SetFn = unsafe extern "C" fn(display: u32, brightness: f32) -> i32;

/// The three entry points brightness control needs. The bundle is kept so
/// the framework stays loaded for as long as the pointers are.
pub struct DisplayServices {
    _bundle: CFBundle,
    can_change: CanChangeFn,
    get: GetFn,
    set: SetFn,
}

fn lookup(bundle: &CFBundle, name: &str) -> Option<*const c_void> {
    let ptr = bundle.function_pointer_for_name(CFString::new(name));
    if ptr.is_null() {
        warn!(symbol = name, "DisplayServices symbol missing");
        return None;
    }
    Some(ptr)
}

impl DisplayServices {
    /// `None` when the framework or any required symbol is missing.
    pub fn load() -> Option<DisplayServices> {
        let Some(url) = CFURL::from_path(FRAMEWORK_PATH, true) else {
            warn!(path = FRAMEWORK_PATH, "invalid DisplayServices path");
            return None;
        };
        let Some(bundle) = CFBundle::new(url) else {
            warn!(path = FRAMEWORK_PATH, "DisplayServices framework not found");
            return None;
        };
        let can_change = lookup(&bundle, "DisplayServicesCanChangeBrightness")?;
        let get = lookup(&bundle, "DisplayServicesGetBrightness")?;
        let set = lookup(&bundle, "DisplayServicesSetBrightness")?;
        unsafe {
            Some(DisplayServices {
                _bundle: bundle,
                can_change: mem::transmute::<*const c_void, CanChangeFn>(can_change),
                get: mem::transmute::<*const c_void, GetFn>(get),
                set: mem::transmute::<*const c_void, SetFn>(set),
            })
        }
    }
}

impl BrightnessBackend for DisplayServices {
    fn builtin_display(&self) -> Option<DisplayId> {
        let displays = match CGDisplay::active_displays() {
            Ok(displays) => displays,
            Err(err) => {
                debug!(err, "cannot list active displays");
                return None;
            }
        };
        displays.into_iter().find(|&id| CGDisplay::new(id).is_builtin())
    }

    fn can_change_brightness(&self, display_id: DisplayId) -> bool {
        unsafe { (self.can_change)(display_id) }
    }

    fn brightness(&self, display_id: DisplayId) -> Option<f32> {
        let mut value = 0.0f32;
        let status = unsafe { (self.get)(display_id, &mut value) };
        if status != 0 {
            debug!(display_id, status, "DisplayServicesGetBrightness failed");
            return None;
        }
        Some(value)
    }

    fn set_brightness(&self, display_id: DisplayId, value: f32) -> Option<f32> {
        let status = unsafe { (self.set)(display_id, value.clamp(0.0, 1.0)) };
        if status != 0 {
            debug!(display_id, status, "DisplayServicesSetBrightness failed");
            return None;
        }
        self.brightness(display_id)
    }
}
