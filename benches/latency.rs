//! Latency benchmarks for the decode pipeline
//!
//! Covers the synchronous per-transaction path:
//! - Instruction scan
//! - Event body decode (single and batch)
//! - Whole transaction decode through filter and normalise

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use solana_pubkey::Pubkey;

use jupiter_swap_indexer::decoder::{decode_swap_event, decode_swaps_event};
use jupiter_swap_indexer::extractor::EVENT_IX_TAG;
use jupiter_swap_indexer::pipeline::{decode_transaction, PipelineConfig, JUPITER_V6_PROGRAM_ID, NATIVE_MINT};
use jupiter_swap_indexer::scanner::scan;
use jupiter_swap_indexer::selector::{EventKind, InstructionKind};
use jupiter_swap_indexer::transaction::{
    CompiledInstruction, InnerInstructionGroup, RawTransaction, Signature,
};

fn usdc() -> Pubkey {
    Pubkey::new_from_array([0x0C; 32])
}

fn single_body() -> Vec<u8> {
    let mut body = Pubkey::new_from_array([0x77; 32]).as_ref().to_vec();
    body.extend_from_slice(NATIVE_MINT.as_ref());
    body.extend_from_slice(&1_000_000_000u64.to_le_bytes());
    body.extend_from_slice(usdc().as_ref());
    body.extend_from_slice(&25_000_000u64.to_le_bytes());
    body
}

fn batch_body(legs: u32) -> Vec<u8> {
    let mut body = legs.to_le_bytes().to_vec();
    for _ in 0..legs {
        body.extend_from_slice(NATIVE_MINT.as_ref());
        body.extend_from_slice(&1_000u64.to_le_bytes());
        body.extend_from_slice(usdc().as_ref());
        body.extend_from_slice(&20u64.to_le_bytes());
    }
    body
}

/// A route transaction behind three unrelated instructions
fn route_tx() -> RawTransaction {
    let mut event = EVENT_IX_TAG.to_vec();
    event.extend_from_slice(&EventKind::Swap.selector());
    event.extend_from_slice(&single_body());

    let mut route = InstructionKind::Route.selector().to_vec();
    route.extend_from_slice(&[0u8; 24]);

    let mut instructions: Vec<_> = (0..3)
        .map(|_| CompiledInstruction {
            program_id_index: 1,
            data: vec![2, 0, 0, 0, 64, 66, 15, 0, 0, 0, 0, 0],
        })
        .collect();
    instructions.push(CompiledInstruction {
        program_id_index: 2,
        data: route,
    });

    RawTransaction {
        signature: Signature::new([7; 64]),
        slot: 250_000_000,
        account_keys: vec![
            Pubkey::new_from_array([1; 32]),
            Pubkey::new_from_array([0; 32]),
            JUPITER_V6_PROGRAM_ID,
        ],
        instructions,
        inner_instructions: vec![InnerInstructionGroup {
            index: 3,
            instructions: vec![CompiledInstruction {
                program_id_index: 2,
                data: event,
            }],
        }],
    }
}

/// Benchmark locating the swap instruction
fn bench_scan(c: &mut Criterion) {
    let tx = route_tx();

    c.bench_function("scan_instructions", |b| {
        b.iter(|| black_box(scan(black_box(&tx), &JUPITER_V6_PROGRAM_ID)))
    });
}

/// Benchmark decoding event bodies
fn bench_decode_events(c: &mut Criterion) {
    let single = single_body();
    let batch = batch_body(4);

    c.bench_function("decode_swap_event", |b| {
        b.iter(|| black_box(decode_swap_event(black_box(&single))))
    });
    c.bench_function("decode_swaps_event_4", |b| {
        b.iter(|| black_box(decode_swaps_event(black_box(&batch))))
    });
}

/// Benchmark the whole synchronous decode of one transaction
fn bench_decode_transaction(c: &mut Criterion) {
    let tx = route_tx();
    let config = PipelineConfig::default();

    c.bench_function("decode_transaction", |b| {
        b.iter(|| black_box(decode_transaction(black_box(&tx), &config)))
    });
}

criterion_group!(benches, bench_scan, bench_decode_events, bench_decode_transaction);

criterion_main!(benches);
