//! Detects default output device and display configuration changes and asks
//! the main context to give the affected channel a fresh try.

use crate::platform::{AudioBackend, DeviceId, Platform, Subscription};
use crate::queue::{Task, TaskSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(|p| p.into_inner()) = true;
        self.cvar.notify_all();
    }

    /// Sleeps up to `timeout`; returns true once stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(|p| p.into_inner());
        let (guard, _) = self
            .cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|p| p.into_inner());
        *guard
    }
}

pub struct ChangeMonitor {
    stop: Arc<StopSignal>,
    poller: Option<thread::JoinHandle<()>>,
    _displays: Option<Subscription>,
}

impl ChangeMonitor {
    pub fn start(platform: &dyn Platform, tasks: TaskSender, interval: Duration) -> ChangeMonitor {
        let stop = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            cvar: Condvar::new(),
        });

        let poller = {
            let stop = Arc::clone(&stop);
            let audio = platform.audio();
            let tasks = tasks.clone();
            thread::Builder::new()
                .name("audio-device-poll".into())
                .spawn(move || poll_default_device(audio, tasks, stop, interval))
        };
        let poller = match poller {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(?err, "failed to spawn audio device poller; device changes will not reset the volume channel");
                None
            }
        };

        let display_tasks = tasks;
        let displays = platform.watch_displays(Box::new(move || {
            info!("display configuration changed");
            display_tasks.send(Task::DisplayChanged);
        }));
        if displays.is_none() {
            warn!("display change notifications unavailable");
        }

        ChangeMonitor {
            stop,
            poller,
            _displays: displays,
        }
    }
}

fn poll_default_device(audio: Arc<dyn AudioBackend>, tasks: TaskSender, stop: Arc<StopSignal>, interval: Duration) {
    let mut last: Option<DeviceId> = audio.default_output_device();
    debug!(?last, "audio device poller started");
    while !stop.wait(interval) {
        let current = audio.default_output_device();
        if current != last {
            info!(?last, ?current, "default output device changed");
            last = current;
            if !tasks.send(Task::AudioDeviceChanged) {
                break;
            }
        }
    }
    debug!("audio device poller stopped");
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.poller.take() {
            if handle.join().is_err() {
                warn!("audio device poller panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;
    use crate::queue::TaskQueue;
    use std::time::Instant;

    fn wait_for(queue: &TaskQueue, timeout: Duration) -> Option<Task> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(task) = queue.try_recv() {
                return Some(task);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn device_change_is_reported() {
        let platform = MockPlatform::new();
        let queue = TaskQueue::new();
        let _monitor = ChangeMonitor::start(&platform, queue.sender(), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(queue.try_recv(), None);
        platform.audio.script(|s| s.device = Some(99));
        assert_eq!(wait_for(&queue, Duration::from_secs(2)), Some(Task::AudioDeviceChanged));
    }

    #[test]
    fn display_change_is_reported() {
        let platform = MockPlatform::new();
        let queue = TaskQueue::new();
        let _monitor = ChangeMonitor::start(&platform, queue.sender(), Duration::from_secs(60));
        platform.fire_display_change();
        assert_eq!(queue.try_recv(), Some(Task::DisplayChanged));
    }

    #[test]
    fn drop_stops_poller_and_unsubscribes() {
        let platform = MockPlatform::new();
        let queue = TaskQueue::new();
        let monitor = ChangeMonitor::start(&platform, queue.sender(), Duration::from_secs(60));
        assert_eq!(platform.display_watchers(), 1);
        let start = Instant::now();
        drop(monitor);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(platform.display_watchers(), 0);
    }
}
