//! Parallel fan-out of load-generator runs, one OS thread per version.
//!
//! Each worker runs its query without holding any lock, then takes the shared
//! result set's mutex just long enough to merge its own result. The coordinator
//! resolves once: when every worker has merged, on the first reported failure,
//! or when the deadline passes.
//!
//! Workers are never cancelled. After a failure or a timeout the remaining
//! threads, and the processes they spawned, keep running detached until they
//! finish on their own; their late merges land in a set nobody reads.

use loadcollect_common::{CollectError, ResultSet};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::Span;

use crate::runner::{Query, QueryRunner};

/// A collection that did not complete, with the results merged up to that point.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Incomplete {
    pub error: CollectError,
    /// The starting set plus every version merged before resolution.
    pub partial: ResultSet,
}

enum Report {
    Merged(String),
    Failed(CollectError),
}

pub struct Coordinator {
    runner: Arc<dyn QueryRunner>,
    span: Span,
}

fn lock(set: &Mutex<ResultSet>) -> MutexGuard<'_, ResultSet> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

impl Coordinator {
    pub fn new(runner: Arc<dyn QueryRunner>, span: Span) -> Self {
        Self { runner, span }
    }

    /// Run every query in parallel and merge each result into `target`.
    ///
    /// Waits at most `deadline`. Version names in `queries` must be unique.
    pub async fn collect(
        &self,
        queries: Vec<Query>,
        target: ResultSet,
        deadline: Duration,
    ) -> Result<ResultSet, Incomplete> {
        let shared = Arc::new(Mutex::new(target));
        let mut pending: BTreeSet<String> = queries.iter().map(|q| q.version.clone()).collect();
        let (tx, mut rx) = mpsc::unbounded_channel();

        tracing::info!(
            parent: &self.span,
            versions = queries.len(),
            deadline_secs = deadline.as_secs_f64(),
            "Starting load generation"
        );

        for query in queries {
            let version = query.version.clone();
            let runner = Arc::clone(&self.runner);
            let worker_set = Arc::clone(&shared);
            let worker_tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("collect-{version}"))
                .spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&query)));
                    let report = match outcome {
                        Ok(Ok(result)) => {
                            lock(&worker_set).absorb(&query.version, result);
                            Report::Merged(query.version)
                        }
                        Ok(Err(e)) => Report::Failed(e),
                        Err(payload) => Report::Failed(CollectError::invocation(
                            &query.version,
                            format!("runner panicked: {}", panic_message(payload.as_ref())),
                        )),
                    };
                    // Fails only once the coordinator has stopped listening.
                    let _ = worker_tx.send(report);
                });

            if let Err(e) = spawned {
                let error = CollectError::invocation(&version, format!("cannot start worker thread: {e}"));
                return Err(self.incomplete(error, &shared));
            }
        }
        drop(tx);

        let wait = async {
            while !pending.is_empty() {
                match rx.recv().await {
                    Some(Report::Merged(version)) => {
                        pending.remove(&version);
                        tracing::debug!(
                            parent: &self.span,
                            version = %version,
                            remaining = pending.len(),
                            "Merged version result"
                        );
                    }
                    Some(Report::Failed(error)) => return Err(error),
                    None => {
                        // Every sender is gone while versions are still pending.
                        let version = pending.iter().next().cloned().unwrap_or_default();
                        return Err(CollectError::invocation(&version, "worker exited without reporting"));
                    }
                }
            }
            Ok(())
        };

        match timeout(deadline, wait).await {
            Ok(Ok(())) => {
                tracing::info!(parent: &self.span, "All versions merged");
                Ok(std::mem::take(&mut *lock(&shared)))
            }
            Ok(Err(error)) => Err(self.incomplete(error, &shared)),
            Err(_) => Err(self.incomplete(CollectError::Timeout(deadline), &shared)),
        }
    }

    fn incomplete(&self, error: CollectError, shared: &Mutex<ResultSet>) -> Incomplete {
        let partial = std::mem::take(&mut *lock(shared));
        tracing::warn!(
            parent: &self.span,
            error = %error,
            versions_held = partial.len(),
            "Load generation did not complete; in-flight workers left running"
        );
        Incomplete { error, partial }
    }
}
