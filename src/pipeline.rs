//! Decode Pipeline
//!
//! Runs one transaction through scan → extract → decode → filter → normalise,
//! then persists the surviving records. Every failure is contained to the item
//! and reported through [`ItemOutcome`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use solana_pubkey::Pubkey;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::decoder::{decode_event, DecodeError};
use crate::dispatcher::Handler;
use crate::extractor::extract;
use crate::filter::{normalize, retain_mint};
use crate::record::{DecodedSwapRecord, KeyStrategy};
use crate::scanner::{scan, InstructionMatch};
use crate::store::{StoreError, SwapStore};
use crate::transaction::RawTransaction;

/// Jupiter Aggregator v6
pub const JUPITER_V6_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4");

/// Wrapped SOL
pub const NATIVE_MINT: Pubkey = Pubkey::from_str_const("So11111111111111111111111111111111111111112");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub program_id: Pubkey,
    pub native_mint: Pubkey,
    pub key_strategy: KeyStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            program_id: JUPITER_V6_PROGRAM_ID,
            native_mint: NATIVE_MINT,
            key_strategy: KeyStrategy::default(),
        }
    }
}

/// Result of decoding one transaction that invoked a swap instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSwaps {
    pub instruction: InstructionMatch,
    /// Event payloads found under the instruction
    pub events: usize,
    /// Swaps decoded from well-formed events, before filtering
    pub swaps: usize,
    /// Records for swaps touching the native mint, in event order
    pub records: Vec<DecodedSwapRecord>,
    /// One entry per event that failed to decode
    pub malformed: Vec<DecodeError>,
}

/// Decode the swaps of `tx` without touching storage.
///
/// Returns `None` when no top-level instruction is a swap on the target
/// program.
pub fn decode_transaction(tx: &RawTransaction, config: &PipelineConfig) -> Option<TransactionSwaps> {
    let instruction = scan(tx, &config.program_id)?;
    let signer = tx.signer()?;
    let layout = instruction.kind.event_layout();

    let mut result = TransactionSwaps {
        instruction,
        events: 0,
        swaps: 0,
        records: Vec::new(),
        malformed: Vec::new(),
    };

    for payload in extract(tx, instruction.index) {
        result.events += 1;
        match decode_event(layout, payload.body) {
            Ok(swaps) => {
                result.swaps += swaps.len();
                result.records.extend(
                    retain_mint(swaps, &config.native_mint)
                        .iter()
                        .map(|swap| normalize(swap, tx, signer)),
                );
            }
            Err(e) => result.malformed.push(e),
        }
    }

    Some(result)
}

/// Per-item failures
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("All swap events were malformed: {0}")]
    Malformed(DecodeError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// What happened to one transaction
#[derive(Debug)]
pub enum ItemOutcome {
    /// No swap instruction or no swap event
    NotApplicable,
    /// Swaps decoded but none touched the native mint
    Filtered { swaps: usize },
    /// Records upserted
    Persisted { records: usize },
    Failed(ItemError),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Persisted { .. })
    }
}

/// Counters kept by [`SwapIndexer`]
#[derive(Debug, Default)]
pub struct IndexerStats {
    received: AtomicU64,
    not_applicable: AtomicU64,
    filtered: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    records_persisted: AtomicU64,
    malformed_events: AtomicU64,
    progress: Notify,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerSnapshot {
    pub received: u64,
    pub not_applicable: u64,
    pub filtered: u64,
    pub successes: u64,
    pub failures: u64,
    pub records_persisted: u64,
    pub malformed_events: u64,
}

impl IndexerStats {
    /// Transactions with at least one persisted record
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Resolve once at least `target` successes have been recorded
    pub async fn wait_for_successes(&self, target: u64) {
        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.successes() >= target {
                return;
            }
            notified.await;
        }
    }

    pub fn snapshot(&self) -> IndexerSnapshot {
        IndexerSnapshot {
            received: self.received.load(Ordering::Relaxed),
            not_applicable: self.not_applicable.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &ItemOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ItemOutcome::NotApplicable => &self.not_applicable,
            ItemOutcome::Filtered { .. } => &self.filtered,
            ItemOutcome::Persisted { records } => {
                self.records_persisted.fetch_add(*records as u64, Ordering::Relaxed);
                &self.successes
            }
            ItemOutcome::Failed(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.progress.notify_waiters();
    }
}

/// Decodes transactions and upserts their native-asset swaps
pub struct SwapIndexer {
    config: PipelineConfig,
    store: Arc<dyn SwapStore>,
    stats: Arc<IndexerStats>,
}

impl SwapIndexer {
    pub fn new(config: PipelineConfig, store: Arc<dyn SwapStore>) -> Self {
        Self {
            config,
            store,
            stats: Arc::new(IndexerStats::default()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<IndexerStats> {
        Arc::clone(&self.stats)
    }

    /// Decode and persist one transaction
    pub async fn process(&self, tx: &RawTransaction) -> ItemOutcome {
        let Some(decoded) = decode_transaction(tx, &self.config) else {
            return ItemOutcome::NotApplicable;
        };

        for e in &decoded.malformed {
            warn!(
                signature = %tx.signature,
                kind = %decoded.instruction.kind,
                "Skipping swap event: {}", e
            );
        }
        self.stats
            .malformed_events
            .fetch_add(decoded.malformed.len() as u64, Ordering::Relaxed);

        if decoded.events == 0 {
            return ItemOutcome::NotApplicable;
        }
        if decoded.records.is_empty() {
            if decoded.swaps == 0 {
                if let Some(first) = decoded.malformed.into_iter().next() {
                    return ItemOutcome::Failed(ItemError::Malformed(first));
                }
            }
            return ItemOutcome::Filtered { swaps: decoded.swaps };
        }

        for (leg, record) in decoded.records.iter().enumerate() {
            let key = self.config.key_strategy.key(record, leg);
            if let Err(e) = self.store.upsert(&key, record).await {
                return ItemOutcome::Failed(ItemError::Persistence(e));
            }
            info!(
                signature = %record.signature,
                slot = record.slot,
                input_mint = %record.input_mint,
                input_amount = record.input_amount,
                output_mint = %record.output_mint,
                output_amount = record.output_amount,
                "Swap stored"
            );
        }

        ItemOutcome::Persisted {
            records: decoded.records.len(),
        }
    }
}

#[async_trait]
impl Handler<RawTransaction> for SwapIndexer {
    async fn handle(&self, tx: RawTransaction) {
        let outcome = self.process(&tx).await;
        match &outcome {
            ItemOutcome::NotApplicable => {
                debug!(signature = %tx.signature, "No swap instruction or event");
            }
            ItemOutcome::Filtered { swaps } => {
                debug!(signature = %tx.signature, swaps, "No swap touched the native mint");
            }
            ItemOutcome::Persisted { .. } => {}
            ItemOutcome::Failed(e) => {
                error!(signature = %tx.signature, slot = tx.slot, "Transaction dropped: {}", e);
            }
        }
        self.stats.record(&outcome);
    }
}
