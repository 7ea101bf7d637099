//! Configuration
//!
//! Command-line flags with environment fallbacks (a `.env` file is loaded by
//! the binary first), validated into an [`IndexerConfig`].

use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::dispatcher::DispatcherConfig;
use crate::pipeline::{PipelineConfig, JUPITER_V6_PROGRAM_ID, NATIVE_MINT};
use crate::record::KeyStrategy;
use crate::source::SubscriptionFilter;
use crate::store::DEFAULT_KEY_PREFIX;
use crate::termination::TerminationPolicy;

/// Errors that can occur while validating configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid public key for {name}: {value}")]
    InvalidPubkey { name: &'static str, value: String },

    #[error("Invalid key strategy: {0}")]
    InvalidKeyStrategy(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Source '{0}' requires building with the '{0}' feature")]
    FeatureDisabled(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Live Yellowstone gRPC subscription
    Geyser,
    /// JSON-lines file of recorded transactions
    Replay,
}

/// Indexes Jupiter v6 swaps touching the native mint
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Where transactions come from
    #[arg(long, env = "INDEXER_SOURCE", value_enum, default_value_t = SourceKind::Replay)]
    pub source: SourceKind,

    /// Yellowstone gRPC endpoint
    #[arg(long, env = "GRPC_ENDPOINT")]
    pub grpc_endpoint: Option<String>,

    /// Yellowstone x-token
    #[arg(long, env = "GRPC_TOKEN", hide_env_values = true)]
    pub grpc_token: Option<String>,

    /// JSON-lines replay file
    #[arg(long, env = "REPLAY_PATH")]
    pub replay_path: Option<String>,

    /// Swap program to index
    #[arg(long, env = "PROGRAM_ID", default_value_t = JUPITER_V6_PROGRAM_ID.to_string())]
    pub program_id: String,

    /// Mint a swap must touch to be kept
    #[arg(long, env = "NATIVE_MINT", default_value_t = NATIVE_MINT.to_string())]
    pub native_mint: String,

    /// Accounts whose transactions are excluded from the subscription
    #[arg(long = "exclude-account", env = "EXCLUDE_ACCOUNTS", value_delimiter = ',')]
    pub exclude_accounts: Vec<String>,

    /// Also subscribe to failed transactions
    #[arg(long, env = "INCLUDE_FAILED")]
    pub include_failed: bool,

    /// Redis URL; records are kept in memory when absent
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Redis key prefix
    #[arg(long, env = "KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    pub key_prefix: String,

    /// `signature` or `signature-leg`
    #[arg(long, env = "KEY_STRATEGY", default_value = "signature")]
    pub key_strategy: String,

    /// Stop after this many transactions stored at least one swap
    #[arg(long, env = "STOP_AFTER", conflicts_with = "run_for_secs")]
    pub stop_after: Option<u64>,

    /// Stop after running this many seconds
    #[arg(long, env = "RUN_FOR_SECS")]
    pub run_for_secs: Option<u64>,

    /// Abort a transaction whose processing exceeds this
    #[arg(long, env = "ITEM_TIMEOUT_MS")]
    pub item_timeout_ms: Option<u64>,

    /// Drop new transactions once this many are queued
    #[arg(long, env = "MAX_QUEUE_DEPTH")]
    pub max_queue_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Replay { path: String },
    Geyser { endpoint: String, x_token: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Redis { url: String, key_prefix: String },
    Memory,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub source: SourceConfig,
    pub subscription: SubscriptionFilter,
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
    pub dispatcher: DispatcherConfig,
    pub termination: TerminationPolicy,
}

fn parse_pubkey(name: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value.trim()).map_err(|_| ConfigError::InvalidPubkey {
        name,
        value: value.to_string(),
    })
}

fn non_zero<T: PartialEq + Default>(name: &'static str, value: Option<T>) -> Result<Option<T>, ConfigError> {
    match value {
        Some(v) if v == T::default() => Err(ConfigError::Zero(name)),
        other => Ok(other),
    }
}

impl IndexerConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let source = match args.source {
            SourceKind::Replay => SourceConfig::Replay {
                path: args.replay_path.ok_or(ConfigError::MissingOption("replay-path"))?,
            },
            SourceKind::Geyser => {
                if !cfg!(feature = "geyser") {
                    return Err(ConfigError::FeatureDisabled("geyser"));
                }
                SourceConfig::Geyser {
                    endpoint: args
                        .grpc_endpoint
                        .ok_or(ConfigError::MissingOption("grpc-endpoint"))?,
                    x_token: args.grpc_token,
                }
            }
        };

        let program_id = parse_pubkey("program-id", &args.program_id)?;
        let native_mint = parse_pubkey("native-mint", &args.native_mint)?;
        let exclude = args
            .exclude_accounts
            .iter()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_pubkey("exclude-account", value))
            .collect::<Result<Vec<_>, _>>()?;
        let key_strategy =
            KeyStrategy::from_str(&args.key_strategy).map_err(ConfigError::InvalidKeyStrategy)?;

        let termination = match (
            non_zero("stop-after", args.stop_after)?,
            non_zero("run-for-secs", args.run_for_secs)?,
        ) {
            (Some(n), _) => TerminationPolicy::MaxSuccesses(n),
            (None, Some(secs)) => TerminationPolicy::Deadline(Duration::from_secs(secs)),
            (None, None) => TerminationPolicy::Unbounded,
        };

        let store = match args.redis_url {
            Some(url) => StoreConfig::Redis {
                url,
                key_prefix: args.key_prefix,
            },
            None => StoreConfig::Memory,
        };

        Ok(Self {
            source,
            subscription: SubscriptionFilter {
                program_id,
                exclude,
                include_failed: args.include_failed,
            },
            pipeline: PipelineConfig {
                program_id,
                native_mint,
                key_strategy,
            },
            store,
            dispatcher: DispatcherConfig {
                item_timeout: non_zero("item-timeout-ms", args.item_timeout_ms)?
                    .map(Duration::from_millis),
                max_queue_depth: non_zero("max-queue-depth", args.max_queue_depth)?,
            },
            termination,
        })
    }
}
