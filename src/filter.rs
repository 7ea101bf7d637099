//! Swap Filter & Normalizer
//!
//! Keeps swaps where either leg is the native asset and converts them to
//! [`DecodedSwapRecord`]s.

use solana_pubkey::Pubkey;

use crate::decoder::SwapEvent;
use crate::record::DecodedSwapRecord;
use crate::transaction::RawTransaction;

/// Whether either leg of `swap` is `mint`
pub fn involves_mint(swap: &SwapEvent, mint: &Pubkey) -> bool {
    swap.input_mint == *mint || swap.output_mint == *mint
}

/// Keep only swaps touching `mint`, preserving order
pub fn retain_mint(swaps: Vec<SwapEvent>, mint: &Pubkey) -> Vec<SwapEvent> {
    swaps.into_iter().filter(|swap| involves_mint(swap, mint)).collect()
}

/// Build the persisted record for `swap` inside `tx`
pub fn normalize(swap: &SwapEvent, tx: &RawTransaction, account: &Pubkey) -> DecodedSwapRecord {
    DecodedSwapRecord {
        signature: tx.signature.to_string(),
        slot: tx.slot,
        account: account.to_string(),
        input_mint: swap.input_mint.to_string(),
        input_amount: swap.input_amount,
        output_mint: swap.output_mint.to_string(),
        output_amount: swap.output_amount,
    }
}
