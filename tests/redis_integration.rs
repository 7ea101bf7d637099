//! Redis Integration Tests
//!
//! These tests require Redis at localhost:6379.
//! They are marked with #[ignore] by default for CI environments.
//!
//! To run these tests:
//! 1. Start Redis: `docker run -d -p 6379:6379 redis:alpine`
//! 2. Run tests: `cargo test --test redis_integration -- --ignored`

use std::collections::HashMap;
use std::sync::Arc;

use redis::AsyncCommands;

use jupiter_swap_indexer::dispatcher::{Dispatcher, DispatcherConfig};
use jupiter_swap_indexer::pipeline::{PipelineConfig, SwapIndexer, NATIVE_MINT};
use jupiter_swap_indexer::record::DecodedSwapRecord;
use jupiter_swap_indexer::store::{RedisSwapStore, SwapStore};
use jupiter_swap_indexer::transaction::RawTransaction;

const REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Create a Redis connection
async fn get_redis_connection() -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
    let client = redis::Client::open(REDIS_URL)?;
    client.get_multiplexed_async_connection().await
}

/// Unique prefix so concurrent runs do not collide
fn test_prefix(name: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-{name}-{nanos}")
}

fn record(output_amount: u64) -> DecodedSwapRecord {
    DecodedSwapRecord {
        signature: "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW".to_string(),
        slot: 250_000_000,
        account: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".to_string(),
        input_mint: NATIVE_MINT.to_string(),
        input_amount: u64::MAX,
        output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
        output_amount,
    }
}

// ==================== Redis Connection Tests ====================

#[tokio::test]
#[ignore = "Requires running Redis at localhost:6379"]
async fn test_connect_to_redis() {
    let result = get_redis_connection().await;
    assert!(result.is_ok(), "Failed to connect to Redis: {:?}", result.err());
}

// ==================== Upsert Tests ====================

#[tokio::test]
#[ignore = "Requires running Redis at localhost:6379"]
async fn test_upsert_writes_all_fields() {
    let prefix = test_prefix("fields");
    let store = RedisSwapStore::connect(REDIS_URL, prefix.as_str())
        .await
        .expect("Failed to connect");
    let mut conn = get_redis_connection().await.expect("Failed to connect");

    let record = record(25_000_000);
    store.upsert(&record.signature, &record).await.expect("Upsert failed");

    let key = store.redis_key(&record.signature);
    let stored: HashMap<String, String> = conn.hgetall(&key).await.expect("HGETALL failed");
    assert_eq!(stored["slot"], "250000000");
    assert_eq!(stored["input_mint"], NATIVE_MINT.to_string());
    assert_eq!(stored["input_amount"], u64::MAX.to_string());
    assert_eq!(stored["output_amount"], "25000000");

    let _: () = conn.del(&key).await.expect("DEL failed");
}

#[tokio::test]
#[ignore = "Requires running Redis at localhost:6379"]
async fn test_upsert_same_key_overwrites() {
    let prefix = test_prefix("overwrite");
    let store = RedisSwapStore::connect(REDIS_URL, prefix.as_str())
        .await
        .expect("Failed to connect");
    let mut conn = get_redis_connection().await.expect("Failed to connect");

    let first = record(1);
    let second = record(2);
    store.upsert(&first.signature, &first).await.expect("Upsert failed");
    store.upsert(&second.signature, &second).await.expect("Upsert failed");

    let key = store.redis_key(&first.signature);
    let amount: String = conn.hget(&key, "output_amount").await.expect("HGET failed");
    assert_eq!(amount, "2");

    let _: () = conn.del(&key).await.expect("DEL failed");
}

// ==================== Full Pipeline Tests ====================

#[tokio::test]
#[ignore = "Requires running Redis at localhost:6379"]
async fn test_dispatcher_to_redis() {
    let prefix = test_prefix("pipeline");
    let store = Arc::new(
        RedisSwapStore::connect(REDIS_URL, prefix.as_str())
            .await
            .expect("Failed to connect"),
    );
    let mut conn = get_redis_connection().await.expect("Failed to connect");

    let indexer = SwapIndexer::new(PipelineConfig::default(), store.clone());
    let stats = indexer.stats();
    let dispatcher = Dispatcher::new(indexer, DispatcherConfig::default());

    // a transaction with no instructions is not applicable and writes nothing
    let empty = RawTransaction::from_json(
        r#"{"signature":"5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW","slot":1,"accountKeys":[],"instructions":[]}"#,
    )
    .expect("Invalid fixture");
    let key = store.redis_key(&empty.signature.to_string());

    dispatcher.push(empty).expect("Push failed");
    dispatcher.wait_idle().await;

    let exists: bool = conn.exists(&key).await.expect("EXISTS failed");
    assert!(!exists);
    assert_eq!(stats.snapshot().not_applicable, 1);
}
