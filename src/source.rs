//! Transaction Sources
//!
//! Anything that yields [`RawTransaction`]s in arrival order: a JSON-lines
//! replay file, an in-process channel, or (with the `geyser` feature) a live
//! Yellowstone subscription. [`ingest`] forwards a source into the dispatcher
//! until the source ends or the termination policy is reached.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_pubkey::Pubkey;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, Handler, PushError};
use crate::pipeline::IndexerStats;
use crate::termination::TerminationPolicy;
use crate::transaction::RawTransaction;

/// Errors raised by a transaction source. All of them end ingestion.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Replay file not found at path: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid transaction on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Yields transactions one at a time; `Ok(None)` means the source is exhausted
#[async_trait]
pub trait TransactionSource: Send {
    async fn next_transaction(&mut self) -> Result<Option<RawTransaction>, SourceError>;
}

#[async_trait]
impl TransactionSource for mpsc::Receiver<RawTransaction> {
    async fn next_transaction(&mut self) -> Result<Option<RawTransaction>, SourceError> {
        Ok(self.recv().await)
    }
}

/// Which transactions a source should deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Only transactions referencing this account
    pub program_id: Pubkey,
    /// Drop transactions referencing any of these
    pub exclude: Vec<Pubkey>,
    /// Deliver failed transactions too
    pub include_failed: bool,
}

impl SubscriptionFilter {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            exclude: Vec::new(),
            include_failed: false,
        }
    }

    /// Account-level match against the transaction's key list
    pub fn matches(&self, tx: &RawTransaction) -> bool {
        tx.account_keys.contains(&self.program_id)
            && !tx.account_keys.iter().any(|key| self.exclude.contains(key))
    }
}

/// Expand ~ to home directory in path
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Replays transactions from a JSON-lines file, one [`RawTransaction`] per line
pub struct ReplaySource {
    path: String,
    lines: Lines<BufReader<File>>,
    line: usize,
    filter: Option<SubscriptionFilter>,
}

impl ReplaySource {
    pub async fn open(path: &str, filter: Option<SubscriptionFilter>) -> Result<Self, SourceError> {
        let expanded = expand_path(path);
        if !Path::new(&expanded).exists() {
            return Err(SourceError::NotFound(expanded));
        }

        let file = File::open(&expanded).await?;
        info!("Replaying transactions from {}", expanded);

        Ok(Self {
            path: expanded,
            lines: BufReader::new(file).lines(),
            line: 0,
            filter,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lines read so far
    pub fn line(&self) -> usize {
        self.line
    }
}

#[async_trait]
impl TransactionSource for ReplaySource {
    async fn next_transaction(&mut self) -> Result<Option<RawTransaction>, SourceError> {
        while let Some(text) = self.lines.next_line().await? {
            self.line += 1;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let tx = RawTransaction::from_json(text).map_err(|source| SourceError::Parse {
                line: self.line,
                source,
            })?;

            match &self.filter {
                Some(filter) if !filter.matches(&tx) => {
                    debug!(signature = %tx.signature, "Skipping transaction outside subscription");
                }
                _ => return Ok(Some(tx)),
            }
        }
        Ok(None)
    }
}

/// Why [`ingest`] stopped consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    MaxSuccesses,
    Deadline,
}

/// Totals for one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub elapsed: Duration,
    pub stop: StopReason,
}

/// Forward `source` into `dispatcher` until the source ends or `policy` is
/// reached, then wait for every dispatched item to finish.
///
/// A source error is returned immediately; items already queued are still
/// drained first.
pub async fn ingest<S, H>(
    source: &mut S,
    dispatcher: &Dispatcher<RawTransaction, H>,
    policy: TerminationPolicy,
    stats: &IndexerStats,
) -> Result<IngestSummary, SourceError>
where
    S: TransactionSource + ?Sized,
    H: Handler<RawTransaction>,
{
    let started = Instant::now();
    let mut received = 0u64;
    let mut dispatched = 0u64;
    let mut rejected = 0u64;

    let stop = loop {
        if policy.is_reached(stats.successes(), started.elapsed()) {
            break stop_reason(policy);
        }

        let next = tokio::select! {
            next = source.next_transaction() => next,
            reason = policy_reached(policy, started, stats) => break reason,
        };

        let tx = match next {
            Ok(Some(tx)) => tx,
            Ok(None) => break StopReason::SourceExhausted,
            Err(e) => {
                dispatcher.wait_idle().await;
                return Err(e);
            }
        };

        received += 1;
        match dispatcher.push(tx) {
            Ok(()) => dispatched += 1,
            Err(PushError::QueueFull(depth, tx)) => {
                rejected += 1;
                warn!(signature = %tx.signature, depth, "Dispatcher queue full, dropping transaction");
            }
        }
    };

    dispatcher.wait_idle().await;

    Ok(IngestSummary {
        received,
        dispatched,
        rejected,
        elapsed: started.elapsed(),
        stop,
    })
}

fn stop_reason(policy: TerminationPolicy) -> StopReason {
    match policy {
        TerminationPolicy::Deadline(_) => StopReason::Deadline,
        _ => StopReason::MaxSuccesses,
    }
}

/// Resolves when `policy` is reached; never resolves for `Unbounded`
async fn policy_reached(policy: TerminationPolicy, started: Instant, stats: &IndexerStats) -> StopReason {
    match policy {
        TerminationPolicy::Unbounded => std::future::pending().await,
        TerminationPolicy::MaxSuccesses(max) => stats.wait_for_successes(max).await,
        TerminationPolicy::Deadline(_) => {
            if let Some(remaining) = policy.remaining(started.elapsed()) {
                tokio::time::sleep(remaining).await;
            }
        }
    }
    stop_reason(policy)
}
