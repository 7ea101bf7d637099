//! Selector Registry
//!
//! Anchor-style 8-byte selectors for the aggregator's swap instructions and
//! swap event logs. A selector is the first 8 bytes of
//! `sha256("<namespace>:<name>")`; instructions use the `global` namespace,
//! events use `event`.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use sha2::{Digest, Sha256};

/// An 8-byte content-derived selector
pub type Selector = [u8; 8];

/// Compute the selector for `name` in `namespace`
pub fn sighash(namespace: &str, name: &str) -> Selector {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut selector = [0u8; 8];
    selector.copy_from_slice(&digest[..8]);
    selector
}

/// The swap instructions we recognise on the target program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// route
    Route,
    /// route_v2
    RouteV2,
    /// shared_accounts_route
    SharedAccountsRoute,
    /// shared_accounts_route_v2
    SharedAccountsRouteV2,
    /// exact_out_route_v2
    ExactOutRoute,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 5] = [
        InstructionKind::Route,
        InstructionKind::RouteV2,
        InstructionKind::SharedAccountsRoute,
        InstructionKind::SharedAccountsRouteV2,
        InstructionKind::ExactOutRoute,
    ];

    /// Returns the on-chain instruction name
    pub fn name(&self) -> &'static str {
        match self {
            InstructionKind::Route => "route",
            InstructionKind::RouteV2 => "route_v2",
            InstructionKind::SharedAccountsRoute => "shared_accounts_route",
            InstructionKind::SharedAccountsRouteV2 => "shared_accounts_route_v2",
            InstructionKind::ExactOutRoute => "exact_out_route_v2",
        }
    }

    /// Returns the 8-byte instruction selector
    pub fn selector(&self) -> Selector {
        sighash("global", self.name())
    }

    /// Layout of the swap event this instruction emits
    pub fn event_layout(&self) -> EventLayout {
        match self {
            InstructionKind::Route | InstructionKind::SharedAccountsRoute => EventLayout::Single,
            InstructionKind::RouteV2
            | InstructionKind::SharedAccountsRouteV2
            | InstructionKind::ExactOutRoute => EventLayout::Batch,
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The swap event logs we recognise inside inner instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// SwapEvent - a single swap with its AMM
    Swap,
    /// SwapsEvent - a count-prefixed batch of swaps
    Swaps,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Swap, EventKind::Swaps];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Swap => "SwapEvent",
            EventKind::Swaps => "SwapsEvent",
        }
    }

    /// Returns the 8-byte event selector
    pub fn selector(&self) -> Selector {
        sighash("event", self.name())
    }
}

/// Binary layout used to decode a swap event body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLayout {
    /// amm · inputMint · inputAmount · outputMint · outputAmount
    Single,
    /// u32 count followed by `count` swaps without an amm
    Batch,
}

impl fmt::Display for EventLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLayout::Single => f.write_str("single-swap"),
            EventLayout::Batch => f.write_str("batch-swap"),
        }
    }
}

static INSTRUCTION_SELECTORS: LazyLock<HashMap<Selector, InstructionKind>> = LazyLock::new(|| {
    InstructionKind::ALL
        .iter()
        .map(|kind| (kind.selector(), *kind))
        .collect()
});

static EVENT_SELECTORS: LazyLock<HashMap<Selector, EventKind>> = LazyLock::new(|| {
    EventKind::ALL
        .iter()
        .map(|kind| (kind.selector(), *kind))
        .collect()
});

/// Look up the instruction kind for a selector
pub fn instruction_kind(selector: &Selector) -> Option<InstructionKind> {
    INSTRUCTION_SELECTORS.get(selector).copied()
}

/// Look up the event kind for a selector
pub fn event_kind(selector: &Selector) -> Option<EventKind> {
    EVENT_SELECTORS.get(selector).copied()
}

/// Read the 8 bytes at `offset` as a selector, if present
pub fn selector_at(data: &[u8], offset: usize) -> Option<Selector> {
    let end = offset.checked_add(8)?;
    let mut selector = [0u8; 8];
    selector.copy_from_slice(data.get(offset..end)?);
    Some(selector)
}

/// Hex-encode a selector for diagnostics
pub fn selector_hex(selector: &Selector) -> String {
    hex::encode(selector)
}
