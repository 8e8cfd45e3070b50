//! Default output device volume and mute through the HAL.

use crate::platform::{AudioBackend, DeviceId};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use tracing::trace;

type AudioObjectId = u32;
type OsStatus = i32;

const SYSTEM_OBJECT: AudioObjectId = 1;
const UNKNOWN_OBJECT: AudioObjectId = 0;

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

const PROPERTY_DEFAULT_OUTPUT_DEVICE: u32 = fourcc(b"dOut");
const PROPERTY_VIRTUAL_MAIN_VOLUME: u32 = fourcc(b"vmvc");
const PROPERTY_MUTE: u32 = fourcc(b"mute");
const SCOPE_GLOBAL: u32 = fourcc(b"glob");
const SCOPE_OUTPUT: u32 = fourcc(b"outp");
const ELEMENT_MAIN: u32 = 0;

#[repr(C)]
struct PropertyAddress {
    selector: u32,
    scope: u32,
    element: u32,
}

impl PropertyAddress {
    const fn output(selector: u32) -> PropertyAddress {
        PropertyAddress {
            selector,
            scope: SCOPE_OUTPUT,
            element: ELEMENT_MAIN,
        }
    }
}

#[link(name = "CoreAudio", kind = "framework")]
unsafe extern "C" {
    fn AudioObjectHasProperty(object: AudioObjectId, address: *const PropertyAddress) -> u8;
    fn AudioObjectGetPropertyData(
        object: AudioObjectId,
        address: *const PropertyAddress,
        qualifier_size: u32,
        qualifier: *const c_void,
        data_size: *mut u32,
        data: *mut c_void,
    ) -> OsStatus;
    fn AudioObjectSetPropertyData(
        object: AudioObjectId,
        address: *const PropertyAddress,
        qualifier_size: u32,
        qualifier: *const c_void,
        data_size: u32,
        data: *const c_void,
    ) -> OsStatus;
}

// The virtual main volume is a service property, not a HAL one.
#[link(name = "AudioToolbox", kind = "framework")]
unsafe extern "C" {
    fn AudioHardwareServiceHasProperty(object: AudioObjectId, address: *const PropertyAddress) -> u8;
    fn AudioHardwareServiceGetPropertyData(
        object: AudioObjectId,
        address: *const PropertyAddress,
        qualifier_size: u32,
        qualifier: *const c_void,
        data_size: *mut u32,
        data: *mut c_void,
    ) -> OsStatus;
    fn AudioHardwareServiceSetPropertyData(
        object: AudioObjectId,
        address: *const PropertyAddress,
        qualifier_size: u32,
        qualifier: *const c_void,
        data_size: u32,
        data: *const c_void,
    ) -> OsStatus;
}

fn get<T: Copy + Default>(object: AudioObjectId, address: &PropertyAddress, service: bool) -> Option<T> {
    let mut value = T::default();
    let mut size = size_of::<T>() as u32;
    let data = &mut value as *mut T as *mut c_void;
    let status = unsafe {
        if service {
            AudioHardwareServiceGetPropertyData(object, address, 0, ptr::null(), &mut size, data)
        } else {
            AudioObjectGetPropertyData(object, address, 0, ptr::null(), &mut size, data)
        }
    };
    if status != 0 || size as usize != size_of::<T>() {
        trace!(object, selector = address.selector, status, "property read failed");
        return None;
    }
    Some(value)
}

fn set<T: Copy>(object: AudioObjectId, address: &PropertyAddress, value: T, service: bool) -> bool {
    let size = size_of::<T>() as u32;
    let data = &value as *const T as *const c_void;
    let status = unsafe {
        if service {
            AudioHardwareServiceSetPropertyData(object, address, 0, ptr::null(), size, data)
        } else {
            AudioObjectSetPropertyData(object, address, 0, ptr::null(), size, data)
        }
    };
    if status != 0 {
        trace!(object, selector = address.selector, status, "property write failed");
    }
    status == 0
}

/// CoreAudio-backed output control. Stateless: every call resolves against
/// the device id it is given.
pub struct MacAudio;

impl AudioBackend for MacAudio {
    fn default_output_device(&self) -> Option<DeviceId> {
        let address = PropertyAddress {
            selector: PROPERTY_DEFAULT_OUTPUT_DEVICE,
            scope: SCOPE_GLOBAL,
            element: ELEMENT_MAIN,
        };
        get::<AudioObjectId>(SYSTEM_OBJECT, &address, false).filter(|&id| id != UNKNOWN_OBJECT)
    }

    fn volume(&self, device: DeviceId) -> Option<f32> {
        let address = PropertyAddress::output(PROPERTY_VIRTUAL_MAIN_VOLUME);
        if unsafe { AudioHardwareServiceHasProperty(device, &address) } == 0 {
            return None;
        }
        get::<f32>(device, &address, true)
    }

    fn set_volume(&self, device: DeviceId, value: f32) -> Option<f32> {
        let address = PropertyAddress::output(PROPERTY_VIRTUAL_MAIN_VOLUME);
        if !set(device, &address, value.clamp(0.0, 1.0), true) {
            return None;
        }
        self.volume(device)
    }

    fn is_muted(&self, device: DeviceId) -> Option<bool> {
        let address = PropertyAddress::output(PROPERTY_MUTE);
        if unsafe { AudioObjectHasProperty(device, &address) } == 0 {
            return None;
        }
        get::<u32>(device, &address, false).map(|muted| muted != 0)
    }

    fn set_muted(&self, device: DeviceId, muted: bool) -> bool {
        let address = PropertyAddress::output(PROPERTY_MUTE);
        set::<u32>(device, &address, muted as u32, false)
    }
}
