//! Constant-pool cleanup (spec.md §4.7, target A only).
//!
//! spec.md describes this as a three-pass algorithm: build an Old→New
//! table in one linear pass, rewrite uses in a second, then erase dead
//! entries in *reverse* index order so earlier erasures never invalidate
//! later indices (spec.md §9 "CP-index renumbering via dense array").
//!
//! This crate's constant pool is a `cranelift_entity::PrimaryMap`, which
//! (like `cranelift-codegen`'s own entity maps) has no removal API by
//! design — entity maps are meant to grow, not shrink, so indices stay
//! stable for the lifetime of the arena. Reverse-order in-place erasure
//! doesn't typecheck against that. This crate gets the same observable
//! result — a contiguous, renumbered surviving set — by rebuilding the
//! pool into a fresh `PrimaryMap` in original order, skipping dead
//! entries; that sidesteps the index-invalidation problem the reverse
//! order existed to avoid, rather than solving it the same way.

use std::collections::BTreeSet;

use cranelift_entity::{EntityRef, PrimaryMap};

use crate::mir::{CpIndex, MachFunction, MachInst};
use crate::result::{PagerandoError, PagerandoResult};

/// Renumber `func`'s surviving constant-pool entries contiguously and
/// rewrite every remaining `CpLoad`'s index to match, erasing `dead`.
///
/// It is an invariant violation (spec.md §7) for any surviving
/// `CpLoad` to reference an index in `dead` — such a load should
/// already have been torn down by the def-use closure rewrite that
/// produced `dead` in the first place.
pub(super) fn renumber(func: &mut MachFunction, dead: &BTreeSet<CpIndex>) -> PagerandoResult<()> {
    if dead.is_empty() {
        return Ok(());
    }

    // Pass 1: build the Old -> New mapping. `None` entries correspond to
    // spec.md's "-1" sentinel for a deleted slot.
    let total = func.constant_pool.len();
    let mut mapping: Vec<Option<u32>> = vec![None; total];
    let mut next = 0u32;
    for old in 0..total {
        if dead.contains(&CpIndex::new(old)) {
            continue;
        }
        mapping[old] = Some(next);
        next += 1;
    }

    // Pass 2: rewrite every remaining explicit use.
    for inst in func.insts.values_mut() {
        if let MachInst::CpLoad { cp, .. } = inst {
            match mapping[cp.index()] {
                Some(new_index) => *cp = CpIndex::new(new_index as usize),
                None => return Err(PagerandoError::DanglingConstantPoolUse(func.func_id, *cp)),
            }
        }
    }

    // Pass 3: rebuild the pool dropping dead entries, preserving order.
    let mut rebuilt: PrimaryMap<CpIndex, _> = PrimaryMap::new();
    for (old, entry) in func.constant_pool.iter() {
        if !dead.contains(&old) {
            rebuilt.push(entry.clone());
        }
    }
    func.constant_pool = rebuilt;

    Ok(())
}
