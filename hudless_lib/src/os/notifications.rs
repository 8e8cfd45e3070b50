use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2_foundation::{NSNotification, NSNotificationCenter, NSString};
use std::ptr::NonNull;

pub type Observer = Retained<AnyObject>;

/// Observes `name` on the default center. With no queue the block runs on the
/// posting thread, which for AppKit screen notifications is the main thread.
pub fn add_observer(name: &str, callback: Box<dyn Fn() + 'static>) -> Observer {
    unsafe {
        let observer = NSNotificationCenter::defaultCenter().addObserverForName_object_queue_usingBlock(
            Some(NSString::from_str(name).as_ref()),
            None,
            None,
            &RcBlock::new(move |_: NonNull<NSNotification>| callback()),
        );
        Retained::cast_unchecked(observer)
    }
}

pub fn remove_observer(observer: Observer) {
    unsafe {
        NSNotificationCenter::defaultCenter().removeObserver(&observer);
    }
}
