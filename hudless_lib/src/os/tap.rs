//! HID-level event tap for system-defined events, run on its own run-loop
//! thread so the callback never waits behind main-thread work.

use crate::error::SessionError;
use crate::filter::{SignalFilter, Verdict};
use crate::keys::{RawSignal, SYSTEM_DEFINED_EVENT};
use crate::platform::TapHandle;
use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use objc2::encode::{Encoding, RefEncode};
use objc2::msg_send;
use objc2::rc::autoreleasepool;
use objc2::runtime::{AnyClass, AnyObject};
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const HID_EVENT_TAP: u32 = 0;
const HEAD_INSERT_EVENT_TAP: u32 = 0;
// Active tap: returning null from the callback drops the event.
const TAP_OPTION_DEFAULT: u32 = 0;
const SYSTEM_DEFINED_MASK: u64 = 1 << SYSTEM_DEFINED_EVENT;
const RUN_SLICE: Duration = Duration::from_millis(250);

#[repr(C)]
pub struct CGEventOpaque {
    _private: [u8; 0],
}

unsafe impl RefEncode for CGEventOpaque {
    const ENCODING_REF: Encoding = Encoding::Pointer(&Encoding::Struct("__CGEvent", &[]));
}

type CGEventRef = *mut CGEventOpaque;
type TapCallback = unsafe extern "C" fn(proxy: *mut c_void, event_type: u32, event: CGEventRef, user_info: *mut c_void) -> CGEventRef;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventGetFlags(event: CGEventRef) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFMachPortInvalidate(port: CFMachPortRef);
}

// NSEvent lives in AppKit.
#[link(name = "AppKit", kind = "framework")]
unsafe extern "C" {}

struct TapPort(CFMachPort);
unsafe impl Send for TapPort {}

struct TapLoop(CFRunLoop);
unsafe impl Send for TapLoop {}

type Ready = Result<(TapPort, TapLoop), SessionError>;

pub struct EventTap {
    running: Arc<AtomicBool>,
    port: TapPort,
    run_loop: TapLoop,
    thread: Option<thread::JoinHandle<()>>,
}

impl EventTap {
    /// Blocks until the tap thread has either registered the tap or failed.
    pub fn spawn(filter: SignalFilter) -> Result<EventTap, SessionError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Ready>();
        let thread = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("signal-tap".into())
                .spawn(move || run_tap(filter, running, ready_tx))
                .map_err(|err| SessionError::RunLoopRegistrationFailed(err.to_string()))?
        };
        match ready_rx.recv() {
            Ok(Ok((port, run_loop))) => Ok(EventTap {
                running,
                port,
                run_loop,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::RunLoopRegistrationFailed("tap thread exited during setup".into()))
            }
        }
    }
}

impl TapHandle for EventTap {
    fn reenable(&self) {
        unsafe { CGEventTapEnable(self.port.0.as_concrete_TypeRef(), true) };
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.run_loop.0.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event tap thread panicked");
            }
        }
        debug!("event tap released");
    }
}

fn run_tap(filter: SignalFilter, running: Arc<AtomicBool>, ready: mpsc::Sender<Ready>) {
    let filter = Box::into_raw(Box::new(filter));
    let release_filter = || unsafe { drop(Box::from_raw(filter)) };

    let port_ref = unsafe {
        CGEventTapCreate(
            HID_EVENT_TAP,
            HEAD_INSERT_EVENT_TAP,
            TAP_OPTION_DEFAULT,
            SYSTEM_DEFINED_MASK,
            tap_callback,
            filter as *mut c_void,
        )
    };
    if port_ref.is_null() {
        release_filter();
        let _ = ready.send(Err(SessionError::HookInstallFailed("CGEventTapCreate returned null".into())));
        return;
    }
    let port = unsafe { CFMachPort::wrap_under_create_rule(port_ref) };

    let source = match port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            unsafe { CFMachPortInvalidate(port.as_concrete_TypeRef()) };
            release_filter();
            let _ = ready.send(Err(SessionError::RunLoopRegistrationFailed(
                "cannot create run loop source".into(),
            )));
            return;
        }
    };
    let run_loop = CFRunLoop::get_current();
    let mode = unsafe { kCFRunLoopDefaultMode };
    run_loop.add_source(&source, mode);
    if !run_loop.contains_source(&source, mode) {
        unsafe { CFMachPortInvalidate(port.as_concrete_TypeRef()) };
        release_filter();
        let _ = ready.send(Err(SessionError::RunLoopRegistrationFailed(
            "source not attached to run loop".into(),
        )));
        return;
    }

    unsafe { CGEventTapEnable(port.as_concrete_TypeRef(), true) };
    let handles = (TapPort(port.clone()), TapLoop(run_loop.clone()));
    if ready.send(Ok(handles)).is_ok() {
        info!("event tap installed");
        while running.load(Ordering::SeqCst) {
            CFRunLoop::run_in_mode(mode, RUN_SLICE, false);
        }
    }

    unsafe {
        CGEventTapEnable(port.as_concrete_TypeRef(), false);
        CFMachPortInvalidate(port.as_concrete_TypeRef());
    }
    run_loop.remove_source(&source, mode);
    drop(source);
    release_filter();
}

unsafe extern "C" fn tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    let filter = unsafe { &*(user_info as *const SignalFilter) };
    let verdict = catch_unwind(AssertUnwindSafe(|| filter.handle(&read_signal(event_type, event))));
    match verdict {
        Ok(Verdict::Consume) => ptr::null_mut(),
        Ok(Verdict::PassThrough) => event,
        Err(_) => {
            warn!(target: "signal-tap", "tap callback panicked; passing event through");
            event
        }
    }
}

fn read_signal(event_type: u32, event: CGEventRef) -> RawSignal {
    let mut signal = RawSignal {
        event_type,
        ..RawSignal::default()
    };
    if event_type != SYSTEM_DEFINED_EVENT || event.is_null() {
        return signal;
    }
    signal.flags = unsafe { CGEventGetFlags(event) };
    if let Some((subtype, data1)) = system_defined_fields(event) {
        signal.subtype = subtype;
        signal.data1 = data1;
    }
    signal
}

/// `subtype` and `data1` are only reachable through the AppKit view of the event.
fn system_defined_fields(event: CGEventRef) -> Option<(i16, i64)> {
    let class = AnyClass::get(c"NSEvent")?;
    autoreleasepool(|_| unsafe {
        let ns_event: *mut AnyObject = msg_send![class, eventWithCGEvent: event];
        if ns_event.is_null() {
            return None;
        }
        let subtype: i16 = msg_send![ns_event, subtype];
        let data1: isize = msg_send![ns_event, data1];
        Some((subtype, data1 as i64))
    })
}
