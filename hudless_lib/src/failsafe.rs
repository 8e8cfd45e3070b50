//! Per-channel working/disabled latch shared between the tap thread and the
//! main context.

use crate::keys::Channel;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelState {
    pub working: bool,
    pub last_error: Option<String>,
}

impl ChannelState {
    pub fn working() -> ChannelState {
        ChannelState {
            working: true,
            last_error: None,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> ChannelState {
        ChannelState {
            working: false,
            last_error: Some(reason.into()),
        }
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState::working()
    }
}

/// Flag and error are always replaced together under one lock per channel.
#[derive(Debug, Default)]
pub struct ChannelStates {
    volume: Mutex<ChannelState>,
    brightness: Mutex<ChannelState>,
}

impl ChannelStates {
    pub fn new() -> ChannelStates {
        ChannelStates::default()
    }

    fn slot(&self, channel: Channel) -> MutexGuard<'_, ChannelState> {
        let slot = match channel {
            Channel::Volume => &self.volume,
            Channel::Brightness => &self.brightness,
        };
        // A panic while holding the lock cannot leave a half-written state.
        slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, channel: Channel) -> ChannelState {
        self.slot(channel).clone()
    }

    pub fn is_working(&self, channel: Channel) -> bool {
        self.slot(channel).working
    }

    pub fn set(&self, channel: Channel, state: ChannelState) {
        *self.slot(channel) = state;
    }

    /// Stores `state` and returns true only if it differs from the current one.
    pub fn set_if_different(&self, channel: Channel, state: ChannelState) -> bool {
        let mut slot = self.slot(channel);
        if *slot == state {
            return false;
        }
        *slot = state;
        true
    }

    pub fn reset_all(&self) {
        for channel in Channel::ALL {
            self.set(channel, ChannelState::working());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_working() {
        let states = ChannelStates::new();
        for channel in Channel::ALL {
            assert_eq!(states.get(channel), ChannelState::working());
        }
    }

    #[test]
    fn set_if_different_reports_real_transitions_only() {
        let states = ChannelStates::new();
        assert!(!states.set_if_different(Channel::Volume, ChannelState::working()));
        assert!(states.set_if_different(Channel::Volume, ChannelState::disabled("cannot read volume")));
        assert!(!states.set_if_different(Channel::Volume, ChannelState::disabled("cannot read volume")));
        assert!(states.set_if_different(Channel::Volume, ChannelState::disabled("cannot set volume")));
        assert!(states.is_working(Channel::Brightness));
    }

    #[test]
    fn reset_clears_error() {
        let states = ChannelStates::new();
        states.set(Channel::Brightness, ChannelState::disabled("no built-in display"));
        states.reset_all();
        assert_eq!(states.get(Channel::Brightness), ChannelState::working());
    }

    #[test]
    fn concurrent_writers_never_tear_state() {
        let states = Arc::new(ChannelStates::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let states = Arc::clone(&states);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            states.set(Channel::Volume, ChannelState::disabled(format!("writer {i}")));
                        } else {
                            states.set(Channel::Volume, ChannelState::working());
                        }
                        let seen = states.get(Channel::Volume);
                        assert_eq!(seen.working, seen.last_error.is_none());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
