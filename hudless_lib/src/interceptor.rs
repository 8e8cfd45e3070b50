//! Interception session lifecycle and main-context task execution.

use crate::brightness::BrightnessControl;
use crate::error::{ChannelError, SessionError};
use crate::failsafe::{ChannelState, ChannelStates};
use crate::filter::SignalFilter;
use crate::keys::{Channel, KeyAction};
use crate::monitor::{ChangeMonitor, DEVICE_POLL_INTERVAL};
use crate::platform::{AudioBackend, Platform, TapHandle};
use crate::queue::{Task, TaskQueue};
use crate::volume::VolumeControl;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type StateListener = Box<dyn FnMut(Channel, &ChannelState)>;

// Field order is teardown order.
struct Session {
    _monitor: ChangeMonitor,
    tap: Box<dyn TapHandle>,
    brightness: Option<BrightnessControl>,
}

/// Owns at most one live interception session. Must be driven from a single
/// main context: `start`, `stop` and `pump` all run there.
pub struct Interceptor<P: Platform> {
    platform: P,
    audio: Arc<dyn AudioBackend>,
    states: Arc<ChannelStates>,
    queue: TaskQueue,
    poll_interval: Duration,
    session: Option<Session>,
    last_error: Option<String>,
    listener: Option<StateListener>,
}

impl<P: Platform> Interceptor<P> {
    pub fn new(platform: P, queue: TaskQueue) -> Interceptor<P> {
        let audio = platform.audio();
        Interceptor {
            platform,
            audio,
            states: Arc::new(ChannelStates::new()),
            queue,
            poll_interval: DEVICE_POLL_INTERVAL,
            session: None,
            last_error: None,
            listener: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Interceptor<P> {
        self.poll_interval = interval;
        self
    }

    /// Called on the main context after every real channel transition.
    pub fn on_state_change(&mut self, listener: impl FnMut(Channel, &ChannelState) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_trusted(&self) -> bool {
        self.platform.is_trusted()
    }

    pub fn request_trust(&self) {
        self.platform.request_trust();
    }

    pub fn channel_state(&self, channel: Channel) -> ChannelState {
        self.states.get(channel)
    }

    /// Diagnostic of the last failed `start`, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.session.is_some() {
            return Ok(());
        }
        for channel in Channel::ALL {
            self.transition(channel, ChannelState::working());
        }

        if !self.platform.is_trusted() {
            return Err(self.fail_start(SessionError::PermissionDenied));
        }

        let brightness = self.probe_brightness();

        let filter = SignalFilter::new(Arc::clone(&self.states), self.queue.sender());
        let tap = match self.platform.install_tap(filter) {
            Ok(tap) => tap,
            Err(err) => return Err(self.fail_start(err)),
        };

        let monitor = ChangeMonitor::start(&self.platform, self.queue.sender(), self.poll_interval);
        self.session = Some(Session {
            _monitor: monitor,
            tap,
            brightness,
        });
        self.last_error = None;
        info!(
            brightness = self.states.is_working(Channel::Brightness),
            "media key interception started"
        );
        Ok(())
    }

    fn fail_start(&mut self, err: SessionError) -> SessionError {
        error!(%err, "cannot start media key interception");
        self.last_error = Some(err.to_string());
        err
    }

    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        drop(session);
        // Work queued by the old session must not run in the next one.
        let mut dropped = 0;
        while self.queue.try_recv().is_some() {
            dropped += 1;
        }
        info!(dropped, "media key interception stopped");
    }

    /// Runs every queued task. Returns how many were taken off the queue.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(task) = self.queue.try_recv() {
            self.run(task);
            handled += 1;
        }
        handled
    }

    fn run(&mut self, task: Task) {
        let Some(session) = self.session.as_ref() else {
            debug!(?task, "no session; dropping task");
            return;
        };
        match task {
            Task::Apply(action) => self.apply(action),
            Task::ReenableTap => {
                session.tap.reenable();
                info!("event tap re-enabled");
            }
            Task::AudioDeviceChanged => {
                self.transition(Channel::Volume, ChannelState::working());
            }
            Task::DisplayChanged => {
                let brightness = self.probe_brightness_quiet();
                let state = match brightness {
                    Some(_) => ChannelState::working(),
                    None => ChannelState::disabled(ChannelError::BrightnessLibraryUnavailable.to_string()),
                };
                if let Some(session) = self.session.as_mut() {
                    session.brightness = brightness;
                }
                if self.transition(Channel::Brightness, state.clone()) && !state.working {
                    warn!(channel = Channel::Brightness.name(), "brightness control lost after display change");
                }
            }
        }
    }

    fn apply(&mut self, action: KeyAction) {
        // Actions queued before a failure must not reach the hardware.
        if !self.states.is_working(action.channel()) {
            debug!(?action, "channel disabled since dispatch; skipping");
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let volume = VolumeControl::new(self.audio.as_ref());
        let result = match action {
            KeyAction::VolumeUp(step) => volume.adjust(step).map(drop),
            KeyAction::VolumeDown(step) => volume.adjust(-step).map(drop),
            KeyAction::Mute => volume.toggle_mute().map(drop),
            KeyAction::BrightnessUp(step) => adjust_brightness(session, step),
            KeyAction::BrightnessDown(step) => adjust_brightness(session, -step),
        };
        if let Err(err) = result {
            self.disable(err);
        }
    }

    fn probe_brightness(&mut self) -> Option<BrightnessControl> {
        let brightness = self.probe_brightness_quiet();
        if brightness.is_none() {
            self.disable(ChannelError::BrightnessLibraryUnavailable);
        }
        brightness
    }

    fn probe_brightness_quiet(&self) -> Option<BrightnessControl> {
        let brightness = self.platform.probe_brightness().map(BrightnessControl::new);
        debug!(available = brightness.is_some(), "probed brightness control");
        brightness
    }

    fn disable(&mut self, err: ChannelError) {
        let channel = err.channel();
        if self.transition(channel, ChannelState::disabled(err.to_string())) {
            warn!(channel = channel.name(), reason = %err, "passing keys through to the system");
        }
    }

    fn transition(&mut self, channel: Channel, state: ChannelState) -> bool {
        if !self.states.set_if_different(channel, state.clone()) {
            return false;
        }
        if state.working {
            info!(channel = channel.name(), "channel working");
        }
        if let Some(listener) = self.listener.as_mut() {
            listener(channel, &state);
        }
        true
    }
}

fn adjust_brightness(session: &Session, delta: f32) -> Result<(), ChannelError> {
    match &session.brightness {
        Some(brightness) => brightness.adjust(delta).map(drop),
        None => Err(ChannelError::BrightnessLibraryUnavailable),
    }
}

impl<P: Platform> Drop for Interceptor<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
