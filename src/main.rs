use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jupiter_swap_indexer::config::{Args, IndexerConfig, SourceConfig, StoreConfig};
use jupiter_swap_indexer::dispatcher::Dispatcher;
use jupiter_swap_indexer::pipeline::SwapIndexer;
use jupiter_swap_indexer::source::{ingest, ReplaySource, TransactionSource};
use jupiter_swap_indexer::store::{MemorySwapStore, RedisSwapStore, SwapStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = IndexerConfig::from_args(Args::parse())?;
    info!(
        program_id = %config.pipeline.program_id,
        native_mint = %config.pipeline.native_mint,
        key_strategy = %config.pipeline.key_strategy,
        termination = ?config.termination,
        "Starting swap indexer"
    );

    let store: Arc<dyn SwapStore> = match &config.store {
        StoreConfig::Redis { url, key_prefix } => {
            let store = RedisSwapStore::connect(url, key_prefix.as_str())
                .await
                .context("connecting to Redis")?;
            info!(key_prefix = %store.key_prefix(), "Writing swaps to Redis");
            Arc::new(store)
        }
        StoreConfig::Memory => {
            info!("No Redis URL configured, keeping swaps in memory");
            Arc::new(MemorySwapStore::new())
        }
    };

    let mut source: Box<dyn TransactionSource> = match &config.source {
        SourceConfig::Replay { path } => {
            Box::new(ReplaySource::open(path, Some(config.subscription.clone())).await?)
        }
        #[cfg(feature = "geyser")]
        SourceConfig::Geyser { endpoint, x_token } => Box::new(
            jupiter_swap_indexer::geyser::GeyserSource::connect(
                endpoint,
                x_token.clone(),
                &config.subscription,
            )
            .await?,
        ),
        #[cfg(not(feature = "geyser"))]
        SourceConfig::Geyser { .. } => {
            anyhow::bail!("built without the geyser feature")
        }
    };

    let indexer = Arc::new(SwapIndexer::new(config.pipeline, store));
    let stats = indexer.stats();
    let dispatcher = Dispatcher::with_shared_handler(indexer, config.dispatcher);

    let summary = ingest(source.as_mut(), &dispatcher, config.termination, &stats).await?;

    let indexed = stats.snapshot();
    let dispatched = dispatcher.stats();
    info!(
        stop = ?summary.stop,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        received = summary.received,
        rejected = summary.rejected,
        not_applicable = indexed.not_applicable,
        filtered = indexed.filtered,
        malformed_events = indexed.malformed_events,
        successes = indexed.successes,
        failures = indexed.failures,
        records_persisted = indexed.records_persisted,
        timed_out = dispatched.timed_out,
        panicked = dispatched.panicked,
        "Swap indexer stopped"
    );

    Ok(())
}
