//! Hand-off of work from the tap thread and monitors to the main context.

use crate::keys::KeyAction;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Task {
    Apply(KeyAction),
    ReenableTap,
    AudioDeviceChanged,
    DisplayChanged,
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Cloneable, non-blocking producer side of the main-context queue.
#[derive(Clone)]
pub struct TaskSender {
    tx: Sender<Task>,
    waker: Option<Waker>,
}

impl TaskSender {
    /// Returns false when the main context is gone.
    pub fn send(&self, task: Task) -> bool {
        if self.tx.send(task).is_err() {
            return false;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
        true
    }
}

pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    waker: Option<Waker>,
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        let (tx, rx) = mpsc::channel();
        TaskQueue { tx, rx, waker: None }
    }

    /// `waker` runs after every send, on the sending thread, so the main loop
    /// can schedule a drain.
    pub fn with_waker(waker: impl Fn() + Send + Sync + 'static) -> TaskQueue {
        TaskQueue {
            waker: Some(Arc::new(waker)),
            ..TaskQueue::new()
        }
    }

    pub fn sender(&self) -> TaskSender {
        TaskSender {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }

    pub fn try_recv(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        TaskQueue::new()
    }
}
