//! Decoding of system-defined hardware-control signals into key actions.

/// `NSSystemDefined` / `NX_SYSDEFINED` event type.
pub const SYSTEM_DEFINED_EVENT: u32 = 14;
/// `kCGEventTapDisabledByTimeout`
pub const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
/// `kCGEventTapDisabledByUserInput`
pub const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

// NX_SUBTYPE_AUX_CONTROL_BUTTONS
const AUX_CONTROL_BUTTONS: i16 = 8;

// IOKit/hidsystem/ev_keymap.h
const NX_KEYTYPE_SOUND_UP: u32 = 0;
const NX_KEYTYPE_SOUND_DOWN: u32 = 1;
const NX_KEYTYPE_BRIGHTNESS_UP: u32 = 2;
const NX_KEYTYPE_BRIGHTNESS_DOWN: u32 = 3;
const NX_KEYTYPE_MUTE: u32 = 7;

const KEY_STATE_DOWN: u32 = 0x0A;

pub const FLAG_MASK_SHIFT: u64 = 0x0002_0000;
pub const FLAG_MASK_ALTERNATE: u64 = 0x0008_0000;
const FINE_STEP_MASK: u64 = FLAG_MASK_SHIFT | FLAG_MASK_ALTERNATE;

pub const STANDARD_STEP: f32 = 1.0 / 16.0;
pub const FINE_STEP: f32 = 1.0 / 64.0;

/// One hardware event as seen by the tap callback.
///
/// `data1` packs the key code in bits 16..32 and the key flags in bits 0..16,
/// of which bits 8..16 hold the key state (`0xA` down, `0xB` up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSignal {
    pub event_type: u32,
    pub subtype: i16,
    pub data1: i64,
    pub flags: u64,
}

impl RawSignal {
    /// Builds an auxiliary-control-button signal the way the HID system packs it.
    pub fn aux_button(key_code: u32, key_state: u32, flags: u64) -> RawSignal {
        RawSignal {
            event_type: SYSTEM_DEFINED_EVENT,
            subtype: AUX_CONTROL_BUTTONS,
            data1: (((key_code & 0xFFFF) << 16) | ((key_state & 0xFF) << 8)) as i64,
            flags,
        }
    }

    pub fn is_system_defined(&self) -> bool {
        self.event_type == SYSTEM_DEFINED_EVENT
    }

    /// The OS switched the tap off (callback too slow, or secure input).
    pub fn is_tap_disabled(&self) -> bool {
        matches!(self.event_type, TAP_DISABLED_BY_TIMEOUT | TAP_DISABLED_BY_USER_INPUT)
    }

    fn key_code(&self) -> u32 {
        ((self.data1 as u64 & 0xFFFF_0000) >> 16) as u32
    }

    fn key_state(&self) -> u32 {
        ((self.data1 as u64 & 0xFF00) >> 8) as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Volume,
    Brightness,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Volume, Channel::Brightness];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Volume => "volume",
            Channel::Brightness => "brightness",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
    VolumeUp(f32),
    VolumeDown(f32),
    Mute,
    BrightnessUp(f32),
    BrightnessDown(f32),
}

impl KeyAction {
    pub fn channel(self) -> Channel {
        match self {
            KeyAction::VolumeUp(_) | KeyAction::VolumeDown(_) | KeyAction::Mute => Channel::Volume,
            KeyAction::BrightnessUp(_) | KeyAction::BrightnessDown(_) => Channel::Brightness,
        }
    }
}

/// Step size for the active modifiers: fine only when Shift and Option are both held.
pub fn step_for_flags(flags: u64) -> f32 {
    if flags & FINE_STEP_MASK == FINE_STEP_MASK {
        FINE_STEP
    } else {
        STANDARD_STEP
    }
}

/// Translates one raw signal into an action. Key-up, repeats of other
/// sub-states and unrelated keys yield `None` and must be passed through.
pub fn decode(signal: &RawSignal) -> Option<KeyAction> {
    if !signal.is_system_defined() || signal.subtype != AUX_CONTROL_BUTTONS {
        return None;
    }
    if signal.key_state() != KEY_STATE_DOWN {
        return None;
    }
    let step = step_for_flags(signal.flags);
    match signal.key_code() {
        NX_KEYTYPE_SOUND_UP => Some(KeyAction::VolumeUp(step)),
        NX_KEYTYPE_SOUND_DOWN => Some(KeyAction::VolumeDown(step)),
        NX_KEYTYPE_MUTE => Some(KeyAction::Mute),
        NX_KEYTYPE_BRIGHTNESS_UP => Some(KeyAction::BrightnessUp(step)),
        NX_KEYTYPE_BRIGHTNESS_DOWN => Some(KeyAction::BrightnessDown(step)),
        _ => None,
    }
}
