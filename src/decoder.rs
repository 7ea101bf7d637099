//! Swap Event Decoder
//!
//! Decodes the two little-endian swap event layouts:
//!
//! | Layout | Fields | Size |
//! |---|---|---|
//! | single | amm(32) inputMint(32) inputAmount(8) outputMint(32) outputAmount(8) | 112 |
//! | batch  | count(u32) then count × { inputMint(32) inputAmount(8) outputMint(32) outputAmount(8) } | 4 + 80·count |
//!
//! The body length must equal the declared size exactly.

use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::selector::EventLayout;

/// Size of a single-swap event body
pub const SWAP_EVENT_LEN: usize = 112;

/// Size of one entry in a batch-swap event body
pub const SWAPS_ENTRY_LEN: usize = 80;

/// Size of the batch-swap count prefix
pub const SWAPS_COUNT_LEN: usize = 4;

/// Errors that can occur while decoding an event body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed {layout} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        layout: EventLayout,
        expected: usize,
        actual: usize,
    },
}

/// A decoded swap. Entries of a batch event carry no AMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapEvent {
    pub amm: Option<Pubkey>,
    pub input_mint: Pubkey,
    pub input_amount: u64,
    pub output_mint: Pubkey,
    pub output_amount: u64,
}

/// An ordered batch of swaps from one batch-swap event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapBatchEvent {
    pub swaps: Vec<SwapEvent>,
}

/// Bounds-checked little-endian reader over an event body
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    layout: EventLayout,
    expected: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], layout: EventLayout, expected: usize) -> Self {
        Self { data, offset: 0, layout, expected }
    }

    fn malformed(&self) -> DecodeError {
        DecodeError::MalformedPayload {
            layout: self.layout,
            expected: self.expected,
            actual: self.data.len(),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset.checked_add(N).ok_or_else(|| self.malformed())?;
        let bytes: [u8; N] = self
            .data
            .get(self.offset..end)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| self.malformed())?;
        self.offset = end;
        Ok(bytes)
    }

    fn pubkey(&mut self) -> Result<Pubkey, DecodeError> {
        self.take::<32>().map(Pubkey::new_from_array)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.take::<8>().map(u64::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn swap(&mut self, amm: Option<Pubkey>) -> Result<SwapEvent, DecodeError> {
        Ok(SwapEvent {
            amm,
            input_mint: self.pubkey()?,
            input_amount: self.u64()?,
            output_mint: self.pubkey()?,
            output_amount: self.u64()?,
        })
    }
}

/// Decode a single-swap event body
pub fn decode_swap_event(body: &[u8]) -> Result<SwapEvent, DecodeError> {
    let mut reader = Reader::new(body, EventLayout::Single, SWAP_EVENT_LEN);
    if body.len() != SWAP_EVENT_LEN {
        return Err(reader.malformed());
    }
    let amm = reader.pubkey()?;
    reader.swap(Some(amm))
}

/// Declared size of a batch body holding `count` entries
pub fn swaps_event_len(count: u32) -> usize {
    usize::try_from(count)
        .unwrap_or(usize::MAX)
        .saturating_mul(SWAPS_ENTRY_LEN)
        .saturating_add(SWAPS_COUNT_LEN)
}

/// Decode a count-prefixed batch-swap event body
pub fn decode_swaps_event(body: &[u8]) -> Result<SwapBatchEvent, DecodeError> {
    let mut reader = Reader::new(body, EventLayout::Batch, SWAPS_COUNT_LEN);
    let count = reader.u32()?;

    reader.expected = swaps_event_len(count);
    if body.len() != reader.expected {
        return Err(reader.malformed());
    }

    let swaps = (0..count)
        .map(|_| reader.swap(None))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SwapBatchEvent { swaps })
}

/// Decode a body with the given layout into its swaps
pub fn decode_event(layout: EventLayout, body: &[u8]) -> Result<Vec<SwapEvent>, DecodeError> {
    match layout {
        EventLayout::Single => decode_swap_event(body).map(|swap| vec![swap]),
        EventLayout::Batch => decode_swaps_event(body).map(|batch| batch.swaps),
    }
}
