//! Bounded-concurrency request queue with priorities, retry-with-backoff and
//! cooperative cancellation.
//!
//! The scheduler knows nothing about ledgers. It runs opaque operations,
//! at most `max_concurrent` at a time, and reports `{total, completed,
//! failed, pending, active}` after every state change.

use crate::cancel::CancelFlag;
use crate::error::{Result, ScanError};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub active: usize,
}

impl SchedulerProgress {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.active == 0
    }
}

pub type SchedulerProgressCallback = Arc<dyn Fn(SchedulerProgress) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries used by [`RequestScheduler::run`].
    pub default_max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            default_max_retries: 3,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    /// `base * 2^retries_used`, capped at `max_delay`.
    pub fn backoff_delay(&self, retries_used: u32) -> Duration {
        1u32.checked_shl(retries_used)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Type-erased unit of work. `attempt` may be called repeatedly; a
/// successful attempt parks its value until `resolve` hands it to the caller.
trait Job: Send {
    fn attempt(&mut self) -> BoxFuture<'_, Result<()>>;
    fn resolve(self: Box<Self>);
    fn reject(self: Box<Self>, err: ScanError);
}

struct TypedJob<T, F> {
    op: F,
    value: Option<T>,
    reply: Option<oneshot::Sender<Result<T>>>,
}

impl<T, F, Fut> Job for TypedJob<T, F>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    fn attempt(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.value = Some((self.op)().await?);
            Ok(())
        })
    }

    fn resolve(mut self: Box<Self>) {
        if let (Some(reply), Some(value)) = (self.reply.take(), self.value.take()) {
            let _ = reply.send(Ok(value));
        }
    }

    fn reject(mut self: Box<Self>, err: ScanError) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(err));
        }
    }
}

struct QueuedItem {
    id: u64,
    priority: i32,
    retries_used: u32,
    max_retries: u32,
    job: Box<dyn Job>,
}

#[derive(Default)]
struct State {
    pending: VecDeque<QueuedItem>,
    active: usize,
    backing_off: usize,
    total: usize,
    completed: usize,
    failed: usize,
    next_id: u64,
}

impl State {
    /// Higher priority first; equal priorities keep insertion order.
    fn insert_by_priority(&mut self, item: QueuedItem) {
        let position = self
            .pending
            .iter()
            .position(|queued| queued.priority < item.priority)
            .unwrap_or(self.pending.len());
        self.pending.insert(position, item);
    }

    fn snapshot(&self) -> SchedulerProgress {
        SchedulerProgress {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            pending: self.pending.len() + self.backing_off,
            active: self.active,
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    cancel: CancelFlag,
    cancel_notify: Notify,
    state: Mutex<State>,
    progress_tx: watch::Sender<SchedulerProgress>,
    callback: Mutex<Option<SchedulerProgressCallback>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self) {
        let snapshot = self.state().snapshot();
        self.progress_tx.send_replace(snapshot);
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(snapshot);
        }
    }

    /// Start queued items until the concurrency cap is reached.
    fn pump(inner: &Arc<Inner>) {
        let mut started = Vec::new();
        {
            let mut state = inner.state();
            let limit = inner.config.max_concurrent.max(1);
            while !inner.cancel.is_cancelled() && state.active < limit {
                let Some(item) = state.pending.pop_front() else {
                    break;
                };
                state.active += 1;
                started.push(item);
            }
        }

        if started.is_empty() {
            return;
        }
        for item in started {
            tokio::spawn(Inner::run_item(inner.clone(), item));
        }
        inner.emit();
    }

    async fn run_item(inner: Arc<Inner>, mut item: QueuedItem) {
        let outcome = item.job.attempt().await;

        let err = match outcome {
            Ok(()) => {
                {
                    let mut state = inner.state();
                    state.active -= 1;
                    state.completed += 1;
                }
                debug!("request {} completed", item.id);
                inner.emit();
                item.job.resolve();
                Inner::pump(&inner);
                return;
            }
            Err(err) => err,
        };

        let cancelled = inner.cancel.is_cancelled();
        if !cancelled && err.is_retryable() && item.retries_used < item.max_retries {
            let delay = inner.config.backoff_delay(item.retries_used);
            item.retries_used += 1;
            warn!(
                "request {} failed ({}), retry {}/{} in {:?}",
                item.id, err, item.retries_used, item.max_retries, delay
            );
            // armed before the slot is released so no cancel() is missed
            let cancelled_while_waiting = inner.cancel_notify.notified();
            tokio::pin!(cancelled_while_waiting);
            cancelled_while_waiting.as_mut().enable();
            {
                let mut state = inner.state();
                state.active -= 1;
                state.backing_off += 1;
            }
            inner.emit();
            Inner::pump(&inner);

            if !inner.cancel.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut cancelled_while_waiting => {}
                }
            }

            let rejected = {
                let mut state = inner.state();
                state.backing_off -= 1;
                if inner.cancel.is_cancelled() {
                    state.failed += 1;
                    Some(item)
                } else {
                    state.pending.push_front(item);
                    None
                }
            };
            if let Some(item) = rejected {
                item.job.reject(ScanError::Cancelled);
            }
            inner.emit();
            Inner::pump(&inner);
            return;
        }

        {
            let mut state = inner.state();
            state.active -= 1;
            state.failed += 1;
        }
        let err = if cancelled { ScanError::Cancelled } else { err };
        debug!("request {} failed terminally: {}", item.id, err);
        item.job.reject(err);
        inner.emit();
        Inner::pump(&inner);
    }
}

/// Cloneable handle; clones share the same queue, counters and cancel flag.
#[derive(Clone)]
pub struct RequestScheduler {
    inner: Arc<Inner>,
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_cancel_flag(config, CancelFlag::new())
    }

    pub fn with_cancel_flag(config: SchedulerConfig, cancel: CancelFlag) -> Self {
        let (progress_tx, _) = watch::channel(SchedulerProgress::default());
        Self {
            inner: Arc::new(Inner {
                config,
                cancel,
                cancel_notify: Notify::new(),
                state: Mutex::new(State::default()),
                progress_tx,
                callback: Mutex::new(None),
            }),
        }
    }

    pub fn with_progress_callback(self, callback: SchedulerProgressCallback) -> Self {
        *self
            .inner
            .callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(callback);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.inner.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Queue `op` and wait for its terminal outcome.
    ///
    /// Failures are retried while `retries_used < max_retries` and the error
    /// is retryable, each time after an exponential backoff and ahead of every
    /// other queued item. Fails immediately with [`ScanError::Cancelled`] once
    /// the scheduler has been cancelled.
    pub async fn enqueue<T, F, Fut>(&self, op: F, priority: i32, max_retries: u32) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        {
            let mut state = self.inner.state();
            if self.inner.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let id = state.next_id;
            state.next_id += 1;
            state.total += 1;
            state.insert_by_priority(QueuedItem {
                id,
                priority,
                retries_used: 0,
                max_retries,
                job: Box::new(TypedJob {
                    op,
                    value: None,
                    reply: Some(reply),
                }),
            });
        }
        self.inner.emit();
        Inner::pump(&self.inner);

        response.await.unwrap_or(Err(ScanError::Cancelled))
    }

    /// [`enqueue`](Self::enqueue) with priority 0 and the configured retries.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let retries = self.inner.config.default_max_retries;
        self.enqueue(op, 0, retries).await
    }

    /// Fail every pending item with [`ScanError::Cancelled`] and refuse new
    /// work. In-flight operations run to completion.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        let drained: Vec<QueuedItem> = {
            let mut state = self.inner.state();
            let drained: Vec<QueuedItem> = state.pending.drain(..).collect();
            state.failed += drained.len();
            drained
        };
        if !drained.is_empty() {
            debug!("cancelled {} pending requests", drained.len());
        }
        for item in drained {
            item.job.reject(ScanError::Cancelled);
        }
        self.inner.cancel_notify.notify_waiters();
        self.inner.emit();
    }

    /// Clear the cancel flag and counters so the scheduler can serve an
    /// independent operation.
    pub fn reset(&self) {
        self.inner.cancel.reset();
        {
            let mut state = self.inner.state();
            state.total = state.pending.len() + state.active + state.backing_off;
            state.completed = 0;
            state.failed = 0;
        }
        self.inner.emit();
    }

    pub fn progress(&self) -> SchedulerProgress {
        self.inner.state().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerProgress> {
        self.inner.progress_tx.subscribe()
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
