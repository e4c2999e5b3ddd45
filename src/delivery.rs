//! Hand-off from worker threads to the thread that owns display state.
//!
//! Workers post closures through a [`DeliveryContext`]; the event loop owning the
//! matching [`DeliveryLoop`] runs them, so callbacks never execute on the worker.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct DeliveryContext {
    tx: Sender<Task>,
}

impl DeliveryContext {
    /// Queue `task` for the delivery thread. Returns false if the loop has gone away.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

pub struct DeliveryLoop {
    rx: Receiver<Task>,
}

impl DeliveryLoop {
    /// Run every task that is already queued without blocking.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for a task, then drain whatever else is queued.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

pub fn channel() -> (DeliveryContext, DeliveryLoop) {
    let (tx, rx) = unbounded::<Task>();
    (DeliveryContext { tx }, DeliveryLoop { rx })
}
