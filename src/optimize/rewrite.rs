//! The def-use closure rewrite at the heart of the intra-bin optimizer
//! (spec.md §4.7 "Rewrite via def-use closure").
//!
//! Per candidate, tears down the entire address-materialization chain
//! (constant-pool/pseudo load → adds → the one call that consumes it)
//! via worklist + visited BFS (spec.md §9 "Worklist + visited pattern
//! for def-use closure"), replacing the sole terminal consumer — the
//! indirect call — with a direct call.

use std::collections::{BTreeSet, VecDeque};

use log::trace;

use super::target::Target;
use crate::ir::FuncId;
use crate::mir::{CpEntry, CpIndex, CpModifier, MachFunction, MachInst, MachInstId, VReg};
use crate::result::{PagerandoError, PagerandoResult};

/// Per-candidate rewrite state (spec.md §4.7 "State machine per
/// candidate"). Purely descriptive here — the real state lives in
/// whether an instruction id is still reachable via `all_insts`, this
/// enum just gives the `trace!` logging something to narrate.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum CandidateState {
    Live,
    RewriteInProgress,
    Erased,
}

/// Rewrite every `(candidate, callee)` pair in `func` via its def-use
/// closure, per spec.md §4.7. Returns the set of constant-pool indices
/// that went dead as a result (empty for targets that don't address
/// candidates through the constant pool), for [`super::cleanup`] to
/// renumber afterward.
pub(super) fn rewrite_candidates(
    func: &mut MachFunction,
    target: &dyn Target,
    candidates: &[(MachInstId, FuncId)],
) -> PagerandoResult<BTreeSet<CpIndex>> {
    let mut dead_cp = BTreeSet::new();

    for &(candidate, callee) in candidates {
        trace!(
            "optimizer: {:?} state={:?} candidate for callee {:?}",
            candidate,
            CandidateState::Live,
            callee
        );
        rewrite_one(func, target, candidate, callee, &mut dead_cp)?;
    }

    Ok(dead_cp)
}

fn rewrite_one(
    func: &mut MachFunction,
    target: &dyn Target,
    candidate: MachInstId,
    callee: FuncId,
    dead_cp: &mut BTreeSet<CpIndex>,
) -> PagerandoResult<()> {
    let mut worklist = VecDeque::from([candidate]);
    let mut discovered = BTreeSet::new();
    trace!("optimizer: {:?} state={:?}", candidate, CandidateState::RewriteInProgress);

    while let Some(inst_id) = worklist.pop_front() {
        if !discovered.insert(inst_id) {
            continue;
        }

        if is_call_site(&func.insts[inst_id]) {
            rewrite_call_site(func, target, inst_id, callee)?;
            continue;
        }

        for user in find_users(func, inst_id) {
            worklist.push_back(user);
        }

        if let MachInst::CpLoad { cp, .. } = &func.insts[inst_id] {
            dead_cp.insert(*cp);
        }
        func.remove_inst(inst_id);
    }

    trace!("optimizer: {:?} state={:?}", candidate, CandidateState::Erased);
    Ok(())
}

fn is_call_site(inst: &MachInst) -> bool {
    matches!(inst, MachInst::IndirectCall { .. } | MachInst::IndirectBranchExchange { .. })
}

/// Rewrite the one call instruction a candidate's chain terminates in.
/// Ordinary indirect calls convert straight to a direct call; `BX`-style
/// calls on targets that can't encode that opcode take the PC-relative
/// secondary path instead (spec.md §4.7).
fn rewrite_call_site(func: &mut MachFunction, target: &dyn Target, inst_id: MachInstId, callee: FuncId) -> PagerandoResult<()> {
    match func.insts[inst_id].clone() {
        MachInst::IndirectCall { args, result, .. } => {
            func.insts[inst_id] = MachInst::DirectCall {
                callee,
                args,
                result,
                predicate: None,
            };
            Ok(())
        }
        MachInst::IndirectBranchExchange { args, result, .. } if !target.supports_pc_relative_rewrite() => {
            // No BX-specific restriction on this target: treat it like
            // any other indirect call.
            func.insts[inst_id] = MachInst::DirectCall {
                callee,
                args,
                result,
                predicate: Some("al"),
            };
            Ok(())
        }
        MachInst::IndirectBranchExchange { .. } => {
            rewrite_branch_exchange_via_pc_relative(func, inst_id, callee);
            Ok(())
        }
        _ => Err(PagerandoError::UnhandledCallOpcode(func.func_id)),
    }
}

/// Target A's secondary path (spec.md §4.7): materialize the callee's
/// address via a freshly inserted PC-relative constant-pool entry and
/// address-add instruction, then retarget the `BX`'s register operand.
/// The call instruction itself is left indirect — only its address
/// chain changes — which is why this does not go through the generic
/// `DirectCall` rewrite above.
fn rewrite_branch_exchange_via_pc_relative(func: &mut MachFunction, inst_id: MachInstId, callee: FuncId) {
    let cp = func.push_cp_entry(CpEntry {
        modifier: CpModifier::PcRel,
        global: callee,
    });
    let offset = func.new_vreg();
    func.insert_before(inst_id, MachInst::CpLoad { dest: offset, cp });
    let addr = func.new_vreg();
    func.insert_before(
        inst_id,
        MachInst::AddrAdd {
            dest: addr,
            base: VReg::PROGRAM_COUNTER,
            addend: offset,
        },
    );
    if let MachInst::IndirectBranchExchange { target_reg, .. } = &mut func.insts[inst_id] {
        *target_reg = addr;
    }
}

/// The value(s) `inst` defines, if any.
fn defined_value(inst: &MachInst) -> Option<VReg> {
    match inst {
        MachInst::CpLoad { dest, .. } | MachInst::AddrAdd { dest, .. } | MachInst::BinAddrPseudo { dest, .. } => Some(*dest),
        _ => None,
    }
}

/// The vregs `inst` reads as operands.
fn operands_of(inst: &MachInst) -> Vec<VReg> {
    match inst {
        MachInst::AddrAdd { base, addend, .. } => vec![*base, *addend],
        MachInst::IndirectCall { target_reg, args, .. } | MachInst::IndirectBranchExchange { target_reg, args, .. } => {
            let mut v = vec![*target_reg];
            v.extend(args.iter().copied());
            v
        }
        MachInst::DirectCall { args, .. } => args.to_vec(),
        MachInst::CpLoad { .. } | MachInst::BinAddrPseudo { .. } | MachInst::Ret | MachInst::Other { .. } => Vec::new(),
    }
}

/// Every instruction in `func` that reads a value `inst_id` defines.
/// `inst_id` having already been torn down earlier in the same closure
/// is handled by the worklist's `discovered` guard, not here: a tombstoned
/// instruction (removed from its block but still present in `func.insts`
/// by index) is simply absent from `all_insts` and so is never returned.
fn find_users(func: &MachFunction, inst_id: MachInstId) -> Vec<MachInstId> {
    let Some(value) = defined_value(&func.insts[inst_id]) else {
        return Vec::new();
    };
    func.all_insts().filter(|&id| operands_of(&func.insts[id]).contains(&value)).collect()
}
