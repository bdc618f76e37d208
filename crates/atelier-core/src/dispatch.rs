//! Bounded fan-out of independent tool tasks.
//!
//! Every task is spawned on the runtime and must hold a permit from the
//! dispatcher's semaphore while it runs, so at most `limit` tasks are in
//! flight. Outcomes are returned in submission order regardless of
//! completion order: each task owns one slot, and no task can observe or
//! abort a sibling. Dropping an unfinished batch aborts every task in it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Per-task outcome of a dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T, E> {
    Succeeded(T),
    Failed(E),
    /// The task panicked or was cancelled by the runtime.
    Aborted(String),
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            TaskOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

/// Fan-out executor with an optional shared concurrency ceiling.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// No ceiling; every task starts immediately.
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    /// A fresh ceiling of `max_in_flight` tasks for this dispatcher only.
    pub fn bounded(max_in_flight: usize) -> Self {
        Self::shared(Arc::new(Semaphore::new(max_in_flight)))
    }

    /// Use an existing semaphore, so several batches share one ceiling.
    pub fn shared(limit: Arc<Semaphore>) -> Self {
        Self { limit: Some(limit) }
    }

    /// Run every task and return their outcomes in submission order.
    pub async fn run<T, E, Fut>(&self, tasks: Vec<Fut>) -> Vec<TaskOutcome<T, E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let total = tasks.len();
        let mut set = JoinSet::new();
        let mut slot_of = HashMap::with_capacity(total);
        for (slot, task) in tasks.into_iter().enumerate() {
            let limit = self.limit.clone();
            let handle = set.spawn(async move {
                // A closed semaphore only happens on shutdown; run unthrottled then.
                let _permit = match limit {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                (slot, task.await)
            });
            slot_of.insert(handle.id(), slot);
        }

        let mut slots: Vec<Option<TaskOutcome<T, E>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, Ok(value))) => slots[slot] = Some(TaskOutcome::Succeeded(value)),
                Ok((slot, Err(error))) => slots[slot] = Some(TaskOutcome::Failed(error)),
                Err(join_error) => {
                    let slot = slot_of.get(&join_error.id()).copied();
                    warn!(slot = ?slot, error = %join_error, "dispatched task aborted");
                    if let Some(slot) = slot {
                        slots[slot] = Some(TaskOutcome::Aborted(join_error.to_string()));
                    }
                }
            }
        }
        let outcomes: Vec<TaskOutcome<T, E>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| TaskOutcome::Aborted("task lost".to_string())))
            .collect();

        debug!(
            total = total,
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            "dispatch batch finished"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn results_keep_submission_order() {
        let tasks: Vec<_> = [30u64, 10, 20]
            .into_iter()
            .map(|delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<u64, String>(delay)
            })
            .collect();

        let outcomes = Dispatcher::unbounded().run(tasks).await;
        let values: Vec<u64> = outcomes.into_iter().filter_map(TaskOutcome::ok).collect();
        assert_eq!(values, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn failure_and_panic_do_not_abort_siblings() {
        let tasks: Vec<std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>> = vec![
            Box::pin(async { Ok(1) }),
            Box::pin(async { Err("boom".to_string()) }),
            Box::pin(async { panic!("task exploded") }),
            Box::pin(async { Ok(4) }),
        ];

        let outcomes = Dispatcher::bounded(2).run(tasks).await;
        assert_eq!(outcomes[0], TaskOutcome::Succeeded(1));
        assert_eq!(outcomes[1], TaskOutcome::Failed("boom".to_string()));
        assert!(matches!(outcomes[2], TaskOutcome::Aborted(_)));
        assert_eq!(outcomes[3], TaskOutcome::Succeeded(4));
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_bounds_in_flight_tasks() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5 + i % 3)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, ()>(i as usize)
                }
            })
            .collect();

        let outcomes = Dispatcher::bounded(6).run(tasks).await;
        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.iter().all(TaskOutcome::is_success));
        assert_eq!(peak.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_batch_aborts_its_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), ()>(())
                }
            })
            .collect();

        let dispatcher = Dispatcher::unbounded();
        let cut_short =
            tokio::time::timeout(Duration::from_secs(1), dispatcher.run(tasks)).await;
        assert!(cut_short.is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
