//! Sequential Dispatcher
//!
//! Decouples ingestion from processing. `push` appends to a FIFO queue without
//! blocking; a single drain task pops items one at a time and awaits the
//! handler for each before taking the next, so items are handled strictly in
//! push order and never overlap.
//!
//! The dispatcher is either Idle (no drain task) or Draining (exactly one drain
//! task). The transition Idle → Draining is a compare-and-swap on an atomic
//! flag, so concurrent pushes start at most one drain task.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error};

/// Processes one dispatched item
#[async_trait]
pub trait Handler<T>: Send + Sync + 'static {
    async fn handle(&self, item: T);
}

/// Dispatcher tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Abort an item whose handler runs longer than this
    pub item_timeout: Option<Duration>,
    /// Reject pushes once this many items are waiting
    pub max_queue_depth: Option<usize>,
}

/// Errors returned by [`Dispatcher::push`]
#[derive(Error)]
pub enum PushError<T> {
    /// The queue is at its configured depth; the item is handed back
    #[error("Dispatcher queue is full ({0} items)")]
    QueueFull(usize, T),
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::QueueFull(depth, _) => f.debug_tuple("QueueFull").field(depth).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Draining,
}

/// Counters kept by the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pushed: AtomicU64,
    processed: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
    panicked: AtomicU64,
    drains_started: AtomicU64,
}

/// Point-in-time copy of [`DispatcherStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherSnapshot {
    pub pushed: u64,
    pub processed: u64,
    pub rejected: u64,
    pub timed_out: u64,
    pub panicked: u64,
    pub drains_started: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            drains_started: self.drains_started.load(Ordering::Relaxed),
        }
    }
}

struct Inner<T, H> {
    queue: Mutex<VecDeque<T>>,
    draining: AtomicBool,
    idle: Notify,
    handler: Arc<H>,
    config: DispatcherConfig,
    stats: DispatcherStats,
}

/// FIFO queue drained by a single worker. Cloning shares the same queue.
pub struct Dispatcher<T, H> {
    inner: Arc<Inner<T, H>>,
}

impl<T, H> Clone for Dispatcher<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, H> Dispatcher<T, H>
where
    T: Send + 'static,
    H: Handler<T>,
{
    pub fn new(handler: H, config: DispatcherConfig) -> Self {
        Self::with_shared_handler(Arc::new(handler), config)
    }

    pub fn with_shared_handler(handler: Arc<H>, config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                idle: Notify::new(),
                handler,
                config,
                stats: DispatcherStats::default(),
            }),
        }
    }

    /// Enqueue `item` and start a drain task if none is running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        {
            let mut queue = self.inner.lock_queue();
            if let Some(max) = self.inner.config.max_queue_depth {
                if queue.len() >= max {
                    self.inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(PushError::QueueFull(queue.len(), item));
                }
            }
            queue.push_back(item);
        }
        self.inner.stats.pushed.fetch_add(1, Ordering::Relaxed);

        if self.inner.try_begin_drain() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(inner.drain());
        }
        Ok(())
    }

    pub fn state(&self) -> DispatcherState {
        if self.inner.draining.load(Ordering::SeqCst) {
            DispatcherState::Draining
        } else {
            DispatcherState::Idle
        }
    }

    /// Items waiting behind the one currently being handled
    pub fn queue_len(&self) -> usize {
        self.inner.lock_queue().len()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == DispatcherState::Idle && self.queue_len() == 0
    }

    /// Wait until the queue is empty and no drain task is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> DispatcherSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.inner.handler
    }
}

impl<T, H> Inner<T, H>
where
    T: Send + 'static,
    H: Handler<T>,
{
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle → Draining; true if this caller won the transition
    fn try_begin_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn drain(self: Arc<Self>) {
        self.stats.drains_started.fetch_add(1, Ordering::Relaxed);
        debug!("Dispatcher draining");

        loop {
            let next = self.lock_queue().pop_front();
            match next {
                Some(item) => self.run_one(item).await,
                None => {
                    self.draining.store(false, Ordering::SeqCst);
                    // A push that landed after the pop saw Draining and did not spawn.
                    if self.lock_queue().is_empty() || !self.try_begin_drain() {
                        break;
                    }
                }
            }
        }

        debug!("Dispatcher idle");
        self.idle.notify_waiters();
    }

    async fn run_one(&self, item: T) {
        let handler = Arc::clone(&self.handler);
        let mut task = tokio::spawn(async move { handler.handle(item).await });

        let joined = match self.config.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                    error!(timeout_ms = limit.as_millis() as u64, "Item handler timed out, skipping");
                    self.stats.processed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            },
            None => task.await,
        };

        if let Err(e) = joined {
            self.stats.panicked.fetch_add(1, Ordering::Relaxed);
            error!("Item handler did not complete: {}", e);
        }
        self.stats.processed.fetch_add(1, Ordering::Relaxed);
    }
}
