//! Inner Event Extractor
//!
//! Swap events are self-CPI logs: inner instructions whose payload is
//! `[8-byte emit prefix][8-byte event selector][event body]`. Children of the
//! matched instruction that do not carry a known event selector are skipped.

use crate::selector::{event_kind, selector_at, EventKind};
use crate::transaction::RawTransaction;

/// Prefix the program writes before every self-CPI event
pub const EVENT_IX_TAG: [u8; 8] = [0xe4, 0x45, 0xa5, 0x2e, 0x51, 0xcb, 0x9a, 0x1d];

/// Offset of the event selector inside an inner instruction payload
pub const EVENT_SELECTOR_OFFSET: usize = 8;

/// Offset of the event body inside an inner instruction payload
pub const EVENT_BODY_OFFSET: usize = 16;

/// A candidate event body borrowed from an inner instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPayload<'a> {
    /// Position within the inner instruction group
    pub position: usize,
    pub kind: EventKind,
    pub body: &'a [u8],
}

/// Yield every swap event payload recorded under top-level instruction `index`.
///
/// A missing inner instruction group yields nothing.
pub fn extract(tx: &RawTransaction, index: usize) -> impl Iterator<Item = EventPayload<'_>> {
    tx.inner_group(index)
        .into_iter()
        .flat_map(|group| group.instructions.iter().enumerate())
        .filter_map(|(position, ix)| {
            let selector = selector_at(&ix.data, EVENT_SELECTOR_OFFSET)?;
            let kind = event_kind(&selector)?;
            Some(EventPayload {
                position,
                kind,
                body: ix.data.get(EVENT_BODY_OFFSET..)?,
            })
        })
}
