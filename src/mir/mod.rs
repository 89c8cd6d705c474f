//! The MIR-level data model the intra-bin optimizer (spec.md §4.7)
//! operates on: post-instruction-selection, pre-register-allocation,
//! SSA machine code.
//!
//! As with [`crate::ir`], the instruction selector and register
//! allocator that produce and consume this representation are external
//! collaborators (spec.md §1); this module owns just enough of a MIR
//! shape to host the call-site patterns §4.7's table describes and the
//! constant-pool bookkeeping its cleanup pass needs.

use cranelift_entity::{entity_impl, EntityRef, PrimaryMap};
use smallvec::SmallVec;

use crate::ir::FuncId;

/// A virtual register, pre-register-allocation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct VReg(u32);
entity_impl!(VReg, "v");

impl VReg {
    /// Reserved virtual register denoting the program counter. Used only
    /// as the implicit base operand of a freshly-inserted
    /// [`MachInst::AddrAdd`] on the intra-bin optimizer's PC-relative
    /// secondary rewrite path (spec.md §4.7, target A's `BX`-style
    /// indirect calls); never produced by [`MachFunction::new_vreg`].
    pub const PROGRAM_COUNTER: VReg = VReg(u32::MAX);
}

/// A basic block in a [`MachFunction`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MachBlockId(u32);
entity_impl!(MachBlockId, "mbb");

/// A machine instruction in a [`MachFunction`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MachInstId(u32);
entity_impl!(MachInstId, "minst");

/// A constant-pool index (spec.md §3 "Constant-pool entry").
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CpIndex(u32);
entity_impl!(CpIndex, "cp");

/// A constant-pool entry's modifier (spec.md §3, §6 "POTOFF / BINOFF").
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CpModifier {
    /// Offset into the page-offset table of the callee's bin.
    PotOff,
    /// Offset of the callee within its bin.
    BinOff,
    /// A direct PC-relative offset to the callee, bypassing the POT
    /// entirely. Never a candidate itself — this is the modifier the
    /// optimizer's own secondary rewrite path inserts (spec.md §4.7,
    /// target A's `BX`-style indirect calls), not one instruction
    /// selection ever produces.
    PcRel,
    /// Any other constant-pool use, irrelevant to this optimizer.
    Other,
}

/// A target-specific constant-pool record (spec.md §3).
#[derive(Clone, Debug)]
pub struct CpEntry {
    pub modifier: CpModifier,
    pub global: FuncId,
}

/// A machine instruction.
///
/// Only the shapes spec.md §4.7's candidate table and its rewrite rules
/// need are modeled; everything else a real function's MIR contains is
/// [`MachInst::Other`].
#[derive(Clone, Debug)]
pub enum MachInst {
    /// Target A: a constant-pool load. Candidate iff `func.constant_pool
    /// [cp].modifier` is `PotOff`/`BinOff`.
    CpLoad { dest: VReg, cp: CpIndex },
    /// Adds a constant-pool-loaded POT offset to the POT base register,
    /// materializing a callee address. Part of the address chain a
    /// `CpLoad` feeds on Target A.
    AddrAdd { dest: VReg, base: VReg, addend: VReg },
    /// Target B: a single pseudo that both loads the POT offset and
    /// adds it to the bin base, carrying the callee symbolically.
    BinAddrPseudo { dest: VReg, callee: FuncId },
    /// An indirect call/branch-and-link consuming an address register.
    IndirectCall {
        target_reg: VReg,
        args: SmallVec<[VReg; 4]>,
        result: Option<VReg>,
    },
    /// A `BX`-style indirect call, Target A's secondary rewrite path:
    /// not trivially convertible to a direct call opcode, so it is
    /// rewritten by materializing a PC-relative address instead (spec.md
    /// §4.7).
    IndirectBranchExchange {
        target_reg: VReg,
        args: SmallVec<[VReg; 4]>,
        result: Option<VReg>,
    },
    /// A direct, PC-relative call. The optimizer's rewrite target.
    DirectCall {
        callee: FuncId,
        args: SmallVec<[VReg; 4]>,
        result: Option<VReg>,
        /// Re-emitted conditional-link predicate operand, preserved
        /// across the rewrite on targets that carry one (spec.md §4.7).
        predicate: Option<&'static str>,
    },
    Ret,
    /// Filler for instructions irrelevant to this optimizer. Carries an
    /// explicit byte size so the size estimator (spec.md §4.1) has
    /// something to sum without this crate needing a real per-target
    /// encoding table.
    Other { bytes: u32 },
}

/// A basic block: an ordered instruction list.
#[derive(Clone, Debug, Default)]
pub struct MachBlock {
    pub insts: Vec<MachInstId>,
}

/// A lowered, pre-register-allocation function.
#[derive(Clone, Debug)]
pub struct MachFunction {
    pub func_id: FuncId,
    pub is_pagerando: bool,
    /// Host-level escape hatch (spec.md §4.7 "Respect any host-level
    /// 'skip this function' flag").
    pub skip_optimizer: bool,
    /// Set by bin assignment; `.bin_<id>` once assigned (spec.md §6).
    pub bin_prefix: Option<String>,
    pub blocks: PrimaryMap<MachBlockId, MachBlock>,
    pub insts: PrimaryMap<MachInstId, MachInst>,
    pub constant_pool: PrimaryMap<CpIndex, CpEntry>,
    next_vreg: u32,
}

impl MachFunction {
    pub fn new(func_id: FuncId) -> Self {
        MachFunction {
            func_id,
            is_pagerando: false,
            skip_optimizer: false,
            bin_prefix: None,
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            constant_pool: PrimaryMap::new(),
            next_vreg: 0,
        }
    }

    pub fn create_block(&mut self) -> MachBlockId {
        self.blocks.push(MachBlock::default())
    }

    pub fn push_inst(&mut self, block: MachBlockId, inst: MachInst) -> MachInstId {
        let id = self.insts.push(inst);
        self.blocks[block].insts.push(id);
        id
    }

    pub fn new_vreg(&mut self) -> VReg {
        let v = VReg::new(self.next_vreg as usize);
        self.next_vreg += 1;
        v
    }

    pub fn push_cp_entry(&mut self, entry: CpEntry) -> CpIndex {
        self.constant_pool.push(entry)
    }

    /// All instructions across all blocks, in layout order.
    pub fn all_insts(&self) -> impl Iterator<Item = MachInstId> + '_ {
        self.blocks.values().flat_map(|b| b.insts.iter().copied())
    }

    /// Find and remove an instruction's id from whatever block contains
    /// it. Used by the optimizer's def-use closure teardown (spec.md
    /// §4.7).
    pub fn remove_inst(&mut self, inst: MachInstId) {
        for block in self.blocks.values_mut() {
            if let Some(pos) = block.insts.iter().position(|&i| i == inst) {
                block.insts.remove(pos);
                break;
            }
        }
    }

    /// Insert `inst` immediately before `before` in `before`'s block.
    pub fn insert_before(&mut self, before: MachInstId, inst: MachInst) -> MachInstId {
        let id = self.insts.push(inst);
        for block in self.blocks.values_mut() {
            if let Some(pos) = block.insts.iter().position(|&i| i == before) {
                block.insts.insert(pos, id);
                break;
            }
        }
        id
    }
}
