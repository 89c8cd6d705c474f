//! The `Target` seam (spec.md §4.7's per-target candidate table).
//!
//! Real instruction selection and encoding are out of this core's scope
//! (spec.md §1); this trait stands in for the per-ISA backend the way
//! `cranelift-codegen`'s `isa::TargetIsa` stands in for a real
//! instruction selector/emitter, generalizing spec.md §4.7's two-row
//! table (Target A / Target B) into one seam instead of hard-coding two
//! targets' candidate-recognition logic into the optimizer itself.

use crate::ir::FuncId;
use crate::mir::{MachFunction, MachInstId};

/// Target-specific recognition of intra-bin call candidates, per
/// spec.md §4.7.
pub trait Target {
    /// Scan `func` for every instruction this target recognizes as an
    /// intra-bin candidate (spec.md §4.7's table), returning each
    /// alongside the callee it resolves to. The optimizer driver filters
    /// this list down to callees that share `func`'s bin; a `Target`
    /// impl need not know about bin assignment at all.
    fn find_candidates(&self, func: &MachFunction) -> Vec<(MachInstId, FuncId)>;

    /// Whether this target has a secondary rewrite path for indirect
    /// calls that cannot become a direct-call opcode (spec.md §4.7,
    /// target A's `BX`-style calls). Targets without such a restriction
    /// never reach it: every indirect call they recognize converts
    /// straight to a direct call.
    fn supports_pc_relative_rewrite(&self) -> bool {
        false
    }

    /// Whether this target requires the constant-pool renumbering pass
    /// after rewriting (spec.md §4.7 "Constant-pool cleanup (target A
    /// only)"). Targets whose candidates aren't constant-pool-addressed
    /// (e.g. target B's bin-addressing pseudo) never need it.
    fn needs_cp_cleanup(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    //! Two toy `Target` implementations exercising spec.md §4.7's table,
    //! the way `cranelift-codegen::isa::test_utils` exists solely to
    //! drive that crate's own test suite.

    use super::Target;
    use crate::ir::FuncId;
    use crate::mir::{CpModifier, MachFunction, MachInst, MachInstId};

    /// Target A: constant-pool-addressed POT/bin offsets, `BX`-style
    /// indirect calls that cannot become direct calls, constant-pool
    /// cleanup required.
    #[derive(Default)]
    pub(crate) struct TargetA;

    impl Target for TargetA {
        fn find_candidates(&self, func: &MachFunction) -> Vec<(MachInstId, FuncId)> {
            func.all_insts()
                .filter_map(|id| match &func.insts[id] {
                    MachInst::CpLoad { cp, .. } => {
                        let entry = &func.constant_pool[*cp];
                        matches!(entry.modifier, CpModifier::PotOff | CpModifier::BinOff).then_some((id, entry.global))
                    }
                    _ => None,
                })
                .collect()
        }

        fn supports_pc_relative_rewrite(&self) -> bool {
            true
        }

        fn needs_cp_cleanup(&self) -> bool {
            true
        }
    }

    /// Target B: a single bin-addressing pseudo that both loads the POT
    /// offset and adds it to the bin base, carrying the callee
    /// symbolically rather than through a constant-pool index. No
    /// `BX`-style restriction, no constant pool to clean up.
    #[derive(Default)]
    pub(crate) struct TargetB;

    impl Target for TargetB {
        fn find_candidates(&self, func: &MachFunction) -> Vec<(MachInstId, FuncId)> {
            func.all_insts()
                .filter_map(|id| match &func.insts[id] {
                    MachInst::BinAddrPseudo { callee, .. } => Some((id, *callee)),
                    _ => None,
                })
                .collect()
        }
    }
}
