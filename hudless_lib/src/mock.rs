//! Scripted platform doubles for tests.

use crate::error::SessionError;
use crate::filter::{SignalFilter, Verdict};
use crate::keys::RawSignal;
use crate::platform::{
    AudioBackend, BrightnessBackend, DeviceId, DisplayId, Platform, Subscription, TapHandle,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq)]
pub enum AudioCall {
    SetVolume(f32),
    SetMuted(bool),
}

#[derive(Debug)]
pub struct AudioScript {
    pub device: Option<DeviceId>,
    pub volume: f32,
    pub muted: bool,
    pub read_fails: bool,
    pub write_fails: bool,
    pub ignore_writes: bool,
    pub mute_read_fails: bool,
    pub mute_write_fails: bool,
    calls: Vec<AudioCall>,
}

#[derive(Clone)]
pub struct MockAudio(Arc<Mutex<AudioScript>>);

impl MockAudio {
    pub fn with_volume(volume: f32) -> MockAudio {
        MockAudio(Arc::new(Mutex::new(AudioScript {
            device: Some(42),
            volume,
            muted: false,
            read_fails: false,
            write_fails: false,
            ignore_writes: false,
            mute_read_fails: false,
            mute_write_fails: false,
            calls: vec![],
        })))
    }

    fn lock(&self) -> MutexGuard<'_, AudioScript> {
        self.0.lock().unwrap()
    }

    pub fn script(&self, f: impl FnOnce(&mut AudioScript)) {
        f(&mut self.lock());
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.lock().calls.clone()
    }

    pub fn volume_writes(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, AudioCall::SetVolume(_)))
            .count()
    }

    pub fn mute_writes(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, AudioCall::SetMuted(_)))
            .count()
    }

    pub fn volume_level(&self) -> f32 {
        self.lock().volume
    }
}

impl AudioBackend for MockAudio {
    fn default_output_device(&self) -> Option<DeviceId> {
        self.lock().device
    }

    fn volume(&self, _device: DeviceId) -> Option<f32> {
        let s = self.lock();
        (!s.read_fails).then_some(s.volume)
    }

    fn set_volume(&self, _device: DeviceId, value: f32) -> Option<f32> {
        let mut s = self.lock();
        s.calls.push(AudioCall::SetVolume(value));
        if s.write_fails {
            return None;
        }
        if !s.ignore_writes {
            s.volume = value;
        }
        Some(s.volume)
    }

    fn is_muted(&self, _device: DeviceId) -> Option<bool> {
        let s = self.lock();
        (!s.mute_read_fails).then_some(s.muted)
    }

    fn set_muted(&self, _device: DeviceId, muted: bool) -> bool {
        let mut s = self.lock();
        s.calls.push(AudioCall::SetMuted(muted));
        if s.mute_write_fails {
            return false;
        }
        s.muted = muted;
        true
    }
}

#[derive(Debug)]
pub struct DisplayScript {
    pub builtin: Option<DisplayId>,
    pub adjustable: bool,
    pub brightness: f32,
    pub read_fails: bool,
    pub write_fails: bool,
    pub ignore_writes: bool,
    writes: usize,
}

#[derive(Clone)]
pub struct MockDisplay(Arc<Mutex<DisplayScript>>);

impl MockDisplay {
    pub fn with_brightness(brightness: f32) -> MockDisplay {
        MockDisplay(Arc::new(Mutex::new(DisplayScript {
            builtin: Some(1),
            adjustable: true,
            brightness,
            read_fails: false,
            write_fails: false,
            ignore_writes: false,
            writes: 0,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, DisplayScript> {
        self.0.lock().unwrap()
    }

    pub fn script(&self, f: impl FnOnce(&mut DisplayScript)) {
        f(&mut self.lock());
    }

    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn level(&self) -> f32 {
        self.lock().brightness
    }
}

impl BrightnessBackend for MockDisplay {
    fn builtin_display(&self) -> Option<DisplayId> {
        self.lock().builtin
    }

    fn can_change_brightness(&self, _display: DisplayId) -> bool {
        self.lock().adjustable
    }

    fn brightness(&self, _display: DisplayId) -> Option<f32> {
        let s = self.lock();
        (!s.read_fails).then_some(s.brightness)
    }

    fn set_brightness(&self, _display: DisplayId, value: f32) -> Option<f32> {
        let mut s = self.lock();
        s.writes += 1;
        if s.write_fails {
            return None;
        }
        if !s.ignore_writes {
            s.brightness = value;
        }
        Some(s.brightness)
    }
}

type DisplayCallback = Rc<dyn Fn()>;

#[derive(Default)]
struct PlatformScript {
    trusted: bool,
    trust_requests: usize,
    brightness_available: bool,
    probes: usize,
    tap_error: Option<SessionError>,
    taps_installed: usize,
    taps_released: usize,
    reenables: usize,
    filter: Option<Rc<SignalFilter>>,
    next_watcher: u64,
    watchers: Vec<(u64, DisplayCallback)>,
}

#[derive(Clone)]
pub struct MockPlatform {
    pub audio: MockAudio,
    pub display: MockDisplay,
    inner: Rc<RefCell<PlatformScript>>,
}

impl MockPlatform {
    /// Trusted, with a working audio device at 0.5 and a built-in display at 0.5.
    pub fn new() -> MockPlatform {
        MockPlatform {
            audio: MockAudio::with_volume(0.5),
            display: MockDisplay::with_brightness(0.5),
            inner: Rc::new(RefCell::new(PlatformScript {
                trusted: true,
                brightness_available: true,
                ..PlatformScript::default()
            })),
        }
    }

    pub fn set_trusted(&self, trusted: bool) {
        self.inner.borrow_mut().trusted = trusted;
    }

    pub fn set_brightness_available(&self, available: bool) {
        self.inner.borrow_mut().brightness_available = available;
    }

    pub fn fail_tap_with(&self, err: Option<SessionError>) {
        self.inner.borrow_mut().tap_error = err;
    }

    pub fn trust_requests(&self) -> usize {
        self.inner.borrow().trust_requests
    }

    pub fn probes(&self) -> usize {
        self.inner.borrow().probes
    }

    pub fn taps_installed(&self) -> usize {
        self.inner.borrow().taps_installed
    }

    pub fn taps_released(&self) -> usize {
        self.inner.borrow().taps_released
    }

    pub fn reenables(&self) -> usize {
        self.inner.borrow().reenables
    }

    pub fn display_watchers(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    /// Delivers a signal the way the OS would: through the tap if one is
    /// installed, otherwise straight past.
    pub fn signal(&self, signal: RawSignal) -> Verdict {
        let filter = self.inner.borrow().filter.clone();
        match filter {
            Some(filter) => filter.handle(&signal),
            None => Verdict::PassThrough,
        }
    }

    pub fn fire_display_change(&self) {
        let callbacks: Vec<DisplayCallback> = self.inner.borrow().watchers.iter().map(|(_, cb)| Rc::clone(cb)).collect();
        for callback in callbacks {
            callback();
        }
    }
}

struct MockTap {
    inner: Rc<RefCell<PlatformScript>>,
}

impl TapHandle for MockTap {
    fn reenable(&self) {
        self.inner.borrow_mut().reenables += 1;
    }
}

impl Drop for MockTap {
    fn drop(&mut self) {
        let mut s = self.inner.borrow_mut();
        s.taps_released += 1;
        s.filter = None;
    }
}

impl Platform for MockPlatform {
    fn is_trusted(&self) -> bool {
        self.inner.borrow().trusted
    }

    fn request_trust(&self) {
        self.inner.borrow_mut().trust_requests += 1;
    }

    fn audio(&self) -> Arc<dyn AudioBackend> {
        Arc::new(self.audio.clone())
    }

    fn probe_brightness(&self) -> Option<Box<dyn BrightnessBackend>> {
        let mut s = self.inner.borrow_mut();
        s.probes += 1;
        if s.brightness_available {
            Some(Box::new(self.display.clone()))
        } else {
            None
        }
    }

    fn install_tap(&self, filter: SignalFilter) -> Result<Box<dyn TapHandle>, SessionError> {
        let mut s = self.inner.borrow_mut();
        if let Some(err) = s.tap_error.clone() {
            return Err(err);
        }
        s.taps_installed += 1;
        s.filter = Some(Rc::new(filter));
        Ok(Box::new(MockTap {
            inner: Rc::clone(&self.inner),
        }))
    }

    fn watch_displays(&self, on_change: Box<dyn Fn() + 'static>) -> Option<Subscription> {
        let mut s = self.inner.borrow_mut();
        let id = s.next_watcher;
        s.next_watcher += 1;
        s.watchers.push((id, Rc::from(on_change)));
        let inner = Rc::clone(&self.inner);
        Some(Subscription::new(move || {
            inner.borrow_mut().watchers.retain(|(watcher, _)| *watcher != id);
        }))
    }
}
