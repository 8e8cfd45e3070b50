//! The consume/pass-through decision made inside the tap callback.
//!
//! Runs on the tap thread: it decodes, reads the channel latch and enqueues.
//! It never touches audio or display hardware.

use crate::failsafe::ChannelStates;
use crate::keys::{decode, RawSignal};
use crate::queue::{Task, TaskSender};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    PassThrough,
    Consume,
}

pub struct SignalFilter {
    states: Arc<ChannelStates>,
    tasks: TaskSender,
}

impl SignalFilter {
    pub fn new(states: Arc<ChannelStates>, tasks: TaskSender) -> SignalFilter {
        SignalFilter { states, tasks }
    }

    pub fn handle(&self, signal: &RawSignal) -> Verdict {
        if signal.is_tap_disabled() {
            debug!(target: "signal-tap", event_type = signal.event_type, "tap disabled by the OS; re-enabling");
            self.tasks.send(Task::ReenableTap);
            return Verdict::PassThrough;
        }
        if !signal.is_system_defined() {
            return Verdict::PassThrough;
        }
        let Some(action) = decode(signal) else {
            return Verdict::PassThrough;
        };
        if !self.states.is_working(action.channel()) {
            trace!(target: "signal-tap", ?action, "channel disabled; passing through");
            return Verdict::PassThrough;
        }
        if !self.tasks.send(Task::Apply(action)) {
            return Verdict::PassThrough;
        }
        trace!(target: "signal-tap", ?action, "consumed");
        Verdict::Consume
    }
}
