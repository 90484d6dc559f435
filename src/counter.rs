use std::{
    pin::pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Counting join over a task graph whose size is only known once it drains.
///
/// Every task holds a [`TaskGuard`] obtained from [`TaskCounter::enter`]
/// before it is spawned. [`TaskCounter::wait`] resolves once the last guard
/// has been dropped.
#[derive(Debug, Clone, Default)]
pub struct TaskCounter {
    inner: Arc<Inner>,
}

impl TaskCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more outstanding task. Call this before handing the
    /// task to the runtime, never from inside it.
    pub fn enter(&self) -> TaskGuard {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Waits until no task is outstanding.
    pub async fn wait(&self) {
        loop {
            // Register interest before reading the count so a drop to zero
            // between the load and the await is not missed.
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Outstanding-task token. Dropping it decrements the counter exactly once,
/// on every exit path of the task that owns it, unwinding included.
#[derive(Debug)]
#[must_use = "the task is considered finished as soon as the guard is dropped"]
pub struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            log::trace!("Task counter reached zero");
            self.inner.idle.notify_waiters();
        }
    }
}
