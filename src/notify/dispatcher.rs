//! Background execution of notification jobs.
//!
//! Jobs are spawned onto a shared [`JoinSet`] and run detached from the caller. Each job runs
//! inside its own panic boundary, so a crashing job is logged and never reaches the code that
//! submitted it. [`NotificationDispatcher::drain`] waits for everything outstanding, which is
//! what shutdown and tests use.

use futures::FutureExt;
use std::future::{Future, poll_fn};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info_span};

/// Shared handle to the set of running notification jobs.
///
/// Cloning is cheap; clones submit to and drain the same set.
#[derive(Debug, Clone, Default)]
pub struct NotificationDispatcher {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

fn log_finished(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => debug!("Notification job cancelled"),
        Err(err) => error!(error = %err, "Notification job failed to complete"),
    }
}

impl NotificationDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns `job` in the background and returns immediately.
    ///
    /// Finished jobs are reaped first. Must be called from within a tokio runtime.
    pub fn submit<F>(&self, label: &'static str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while let Some(result) = tasks.try_join_next() {
            log_finished(result);
        }

        debug!(job = label, outstanding = tasks.len(), "Dispatching notification job");
        tasks.spawn(
            async move {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!(job = label, "Notification job panicked");
                }
            }
            .instrument(info_span!("notification_job", job = label)),
        );
    }

    /// Number of jobs that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut tasks = self.lock();
        while let Some(result) = tasks.try_join_next() {
            log_finished(result);
        }
        tasks.len()
    }

    /// Waits until every submitted job has finished, including jobs submitted while draining.
    ///
    /// Jobs stay in the shared set while waiting, so dropping this future leaves them running
    /// and still counted by [`Self::pending`].
    pub async fn drain(&self) {
        while let Some(result) = poll_fn(|cx| self.lock().poll_join_next(cx)).await {
            log_finished(result);
        }
    }
}
