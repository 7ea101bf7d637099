//! Jupiter Swap Indexer Library
//!
//! This crate decodes Jupiter v6 swap events from streamed Solana
//! transactions, keeps swaps that touch the native mint, and upserts them into
//! Redis through a sequential dispatcher.

pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod extractor;
pub mod filter;
#[cfg(feature = "geyser")]
pub mod geyser;
pub mod pipeline;
pub mod record;
pub mod scanner;
pub mod selector;
pub mod source;
pub mod store;
pub mod termination;
pub mod transaction;

// Re-export commonly used types
pub use decoder::{decode_event, DecodeError, SwapEvent};
pub use dispatcher::{Dispatcher, DispatcherConfig, Handler};
pub use pipeline::{decode_transaction, ItemOutcome, PipelineConfig, SwapIndexer};
pub use record::{DecodedSwapRecord, KeyStrategy};
pub use selector::{EventKind, EventLayout, InstructionKind, Selector};
pub use store::{MemorySwapStore, RedisSwapStore, SwapStore};
pub use transaction::RawTransaction;
