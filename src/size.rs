//! Size estimator (spec.md §4.1).
//!
//! Purely functional: sums per-instruction byte sizes queried from the
//! target and never mutates the function it measures.

use crate::mir::{MachFunction, MachInst};

/// The target-provided byte size of a single machine instruction. Real
/// per-ISA encoding tables are instruction-selection territory and out
/// of this core's scope (spec.md §1); this trait is the contract the
/// estimator demands from whatever does own that table.
pub trait InstructionSizer {
    fn size_of(&self, inst: &MachInst) -> u32;
}

/// A reference sizer with simple, fixed per-opcode sizes. Useful for
/// tests and for targets that have not wired up a real encoding table;
/// not meant to be authoritative for any actual ISA.
#[derive(Default)]
pub struct DefaultSizer;

impl InstructionSizer for DefaultSizer {
    fn size_of(&self, inst: &MachInst) -> u32 {
        match inst {
            MachInst::CpLoad { .. } => 4,
            MachInst::AddrAdd { .. } => 4,
            MachInst::BinAddrPseudo { .. } => 8,
            MachInst::IndirectCall { .. } => 4,
            MachInst::IndirectBranchExchange { .. } => 4,
            MachInst::DirectCall { .. } => 4,
            MachInst::Ret => 4,
            MachInst::Other { bytes } => *bytes,
        }
    }
}

/// Estimate `func`'s size in bytes: the sum of its instructions' sizes,
/// floored at `min_function_size` so trivially empty functions still
/// occupy a unit (spec.md §4.1).
pub fn estimate_size(func: &MachFunction, sizer: &dyn InstructionSizer, min_function_size: u32) -> u32 {
    let total: u32 = func
        .all_insts()
        .map(|id| sizer.size_of(&func.insts[id]))
        .sum();
    total.max(min_function_size)
}
