//! Instruction Scanner
//!
//! Finds the first top-level instruction that invokes the target program with
//! a recognised swap selector.

use solana_pubkey::Pubkey;

use crate::selector::{instruction_kind, selector_at, InstructionKind};
use crate::transaction::RawTransaction;

/// The matched swap instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionMatch {
    /// Position among the transaction's top-level instructions
    pub index: usize,
    pub kind: InstructionKind,
}

/// Scan top-level instructions in order and return the first swap instruction
/// addressed to `program_id`.
///
/// Both the program check and the selector check must pass; a matching
/// selector on any other program is ignored. Payloads shorter than a selector
/// are skipped.
pub fn scan(tx: &RawTransaction, program_id: &Pubkey) -> Option<InstructionMatch> {
    tx.instructions.iter().enumerate().find_map(|(index, ix)| {
        let selector = selector_at(&ix.data, 0)?;
        if tx.program_id(ix) != Some(program_id) {
            return None;
        }
        instruction_kind(&selector).map(|kind| InstructionMatch { index, kind })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::fixtures::*;
    use crate::transaction::CompiledInstruction;

    #[test]
    fn test_scan_finds_route_instruction() {
        let tx = transaction(vec![program_ix(instruction_data(InstructionKind::Route))], vec![]);
        assert_eq!(
            scan(&tx, &program()),
            Some(InstructionMatch { index: 0, kind: InstructionKind::Route })
        );
    }

    #[test]
    fn test_scan_returns_none_without_target_program() {
        let tx = transaction(
            vec![other_ix(vec![2, 0, 0, 0, 0, 0, 0, 0, 1]), other_ix(vec![])],
            vec![],
        );
        assert_eq!(scan(&tx, &program()), None);
    }

    #[test]
    fn test_scan_requires_program_even_on_selector_collision() {
        let tx = transaction(vec![other_ix(instruction_data(InstructionKind::RouteV2))], vec![]);
        assert_eq!(scan(&tx, &program()), None);
    }

    #[test]
    fn test_scan_ignores_unknown_selector_on_target_program() {
        let tx = transaction(vec![program_ix(vec![0x11; 24])], vec![]);
        assert_eq!(scan(&tx, &program()), None);
    }

    #[test]
    fn test_scan_picks_earliest_match() {
        let tx = transaction(
            vec![
                other_ix(vec![0u8; 4]),
                program_ix(instruction_data(InstructionKind::SharedAccountsRouteV2)),
                program_ix(instruction_data(InstructionKind::Route)),
            ],
            vec![],
        );
        assert_eq!(
            scan(&tx, &program()),
            Some(InstructionMatch { index: 1, kind: InstructionKind::SharedAccountsRouteV2 })
        );
    }

    #[test]
    fn test_scan_skips_short_payload() {
        let mut short = InstructionKind::Route.selector().to_vec();
        short.truncate(7);
        let tx = transaction(
            vec![program_ix(short), program_ix(instruction_data(InstructionKind::ExactOutRoute))],
            vec![],
        );
        assert_eq!(
            scan(&tx, &program()),
            Some(InstructionMatch { index: 1, kind: InstructionKind::ExactOutRoute })
        );
    }

    #[test]
    fn test_scan_skips_out_of_range_program_index() {
        let tx = transaction(
            vec![CompiledInstruction {
                program_id_index: 40,
                data: instruction_data(InstructionKind::Route),
            }],
            vec![],
        );
        assert_eq!(scan(&tx, &program()), None);
    }

    #[test]
    fn test_scan_exact_selector_length_matches() {
        let tx = transaction(
            vec![program_ix(InstructionKind::RouteV2.selector().to_vec())],
            vec![],
        );
        assert_eq!(scan(&tx, &program()).map(|m| m.kind), Some(InstructionKind::RouteV2));
    }
}
