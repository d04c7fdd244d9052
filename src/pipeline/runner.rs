//! Bounded concurrent execution of independent async work items.
//!
//! A fixed pool of workers pulls the next unstarted index from a shared cursor.
//! Each item runs in its own spawned task so a panic is contained to its slot.
//! Workers report `(index, outcome)` over a channel to a single consumer.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Why a work item produced no value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was never reported")]
    Lost,
}

/// Result of one work item
pub type TaskOutcome<T> = Result<T, TaskError>;

/// Runs work items with at most `limit` in flight.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    limit: usize,
}

impl BatchRunner {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Start all items; results arrive through the returned handle as they finish.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, E, F, Fut>(&self, tasks: Vec<F>) -> BatchHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let total = tasks.len();
        let slots: Arc<Vec<Mutex<Option<F>>>> =
            Arc::new(tasks.into_iter().map(|t| Mutex::new(Some(t))).collect());
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        for _ in 0..self.limit.min(total) {
            let slots = Arc::clone(&slots);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= slots.len() {
                        break;
                    }
                    let task = slots[index].lock().ok().and_then(|mut slot| slot.take());
                    let outcome = match task {
                        Some(task) => run_one(task).await,
                        None => Err(TaskError::Lost),
                    };
                    if tx.send((index, outcome)).is_err() {
                        // consumer went away; nothing left to report to
                        break;
                    }
                }
            });
        }

        BatchHandle { rx, total }
    }

    /// Run every item and return outcomes aligned with the input order.
    pub async fn run_all<T, E, F, Fut>(&self, tasks: Vec<F>) -> Vec<TaskOutcome<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let total = tasks.len();
        let mut handle = self.spawn(tasks);
        let mut results: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
        while let Some((index, outcome)) = handle.next().await {
            results[index] = Some(outcome);
        }
        results
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(TaskError::Lost)))
            .collect()
    }
}

async fn run_one<T, E, F, Fut>(task: F) -> TaskOutcome<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    match tokio::spawn(task()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskError::Failed(e.to_string())),
        Err(join_error) if join_error.is_panic() => {
            let payload = join_error.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(TaskError::Panicked(message))
        }
        Err(join_error) => Err(TaskError::Failed(join_error.to_string())),
    }
}

/// Completion-order stream of `(index, outcome)` pairs
#[derive(Debug)]
pub struct BatchHandle<T> {
    rx: mpsc::UnboundedReceiver<(usize, TaskOutcome<T>)>,
    total: usize,
}

impl<T> BatchHandle<T> {
    /// Next finished item, or `None` once every worker has exited
    pub async fn next(&mut self) -> Option<(usize, TaskOutcome<T>)> {
        self.rx.recv().await
    }

    /// Number of items submitted
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
