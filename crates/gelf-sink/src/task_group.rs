// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Counts spawned tasks so callers can wait until none is running.
///
/// Unlike `tokio_util::task::TaskTracker` the group never needs to be closed: `wait`
/// returns whenever the count drops to zero and new tasks may be spawned afterwards.
#[derive(Clone, Debug)]
pub struct TaskGroup {
    active: Arc<watch::Sender<usize>>,
}

/// Keeps its group active until dropped.
#[derive(Debug)]
pub struct TaskGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active.send_modify(|active| *active -= 1);
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    #[must_use]
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            active: Arc::new(active),
        }
    }

    /// Counts work that has not been spawned yet, such as an event waiting in a queue.
    #[must_use]
    pub fn track(&self) -> TaskGuard {
        self.active.send_modify(|active| *active += 1);
        TaskGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Spawns `future` on the runtime. The task counts as active from this call until the
    /// future completes or is dropped.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    #[must_use]
    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Resolves once no task of the group is running.
    pub async fn wait(&self) {
        let mut active = self.active.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = active.wait_for(|active| *active == 0).await;
    }
}

/// A [`TaskGroup`] split into generations.
///
/// [`Generations::seal`] hands back the group holding everything tracked so far and starts
/// a fresh one, so waiting on the sealed group is not held up by work that arrives later.
#[derive(Debug, Default)]
pub struct Generations {
    current: Mutex<TaskGroup>,
}

impl Generations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn track(&self) -> TaskGuard {
        self.lock().track()
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.lock().spawn(future)
    }

    /// Closes the current generation and returns it.
    pub fn seal(&self) -> TaskGroup {
        std::mem::take(&mut *self.lock())
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, TaskGroup> {
        self.current.lock().expect("lock poisoned")
    }
}
