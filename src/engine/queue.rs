//! Hand-off of staged updates from the worker to the consumer thread.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// A staged update, applied to `T` on the consumer thread.
pub type UpdateAction<T> = Box<dyn FnOnce(&T) -> Result<()> + Send>;

/// FIFO of pending updates.
///
/// Any thread may enqueue. Only the consumer drains, one action per call, and
/// the queue lock is released before the action runs so an action may enqueue
/// more work or take other locks.
pub struct UpdateQueue<T> {
    pending: Mutex<VecDeque<(String, UpdateAction<T>)>>,
}

impl<T> Default for UpdateQueue<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> UpdateQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action. `label` only appears in logs.
    pub fn enqueue<F>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce(&T) -> Result<()> + Send + 'static,
    {
        let label = label.into();
        let mut pending = self.pending.lock();
        pending.push_back((label, Box::new(action)));
        tracing::trace!("[queue] {} pending", pending.len());
    }

    /// Pop and run the oldest action. Returns false if the queue was empty.
    ///
    /// Errors and panics from the action are logged and swallowed.
    pub fn drain_one(&self, target: &T) -> bool {
        let next = self.pending.lock().pop_front();
        let Some((label, action)) = next else {
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| action(target))) {
            Ok(Ok(())) => tracing::debug!("[queue] applied {}", label),
            Ok(Err(e)) => tracing::error!("[queue] {} failed: {}", label, e),
            Err(_) => tracing::error!("[queue] {} panicked", label),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Drop every pending action. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut *self.pending.lock());
        dropped.len()
    }
}
