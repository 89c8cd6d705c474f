//! The intra-bin optimizer (spec.md §4.7): recognizes call sites that
//! resolve through the Page-Offset Table but target a callee in the
//! *same* bin, and rewrites them into direct calls. MIR-level,
//! pre-register-allocation, requires SSA form.

mod cleanup;
mod rewrite;
pub mod target;

pub use target::Target;

use log::debug;

use crate::ir::FuncId;
use crate::mir::MachFunction;
use crate::result::PagerandoResult;

/// Run the intra-bin optimizer over one machine function (spec.md §4.7).
///
/// `same_bin` decides, for a candidate's resolved callee, whether that
/// callee lives in `func`'s bin — the caller supplies this (it needs a
/// module-wide view of bin assignment that a single function doesn't
/// have); a candidate whose callee doesn't share the bin is left alone.
///
/// No-op if `func` isn't pagerando, carries the host-level
/// `skip_optimizer` flag (spec.md §4.7 "Applicability"), or hasn't been
/// assigned a bin yet.
pub fn optimize_function(func: &mut MachFunction, target: &dyn Target, same_bin: impl Fn(FuncId) -> bool) -> PagerandoResult<()> {
    if !func.is_pagerando || func.skip_optimizer || func.bin_prefix.is_none() {
        debug!("intra-bin optimizer: skipping {:?} (not applicable)", func.func_id);
        return Ok(());
    }

    let candidates: Vec<_> = target
        .find_candidates(func)
        .into_iter()
        .filter(|&(_, callee)| same_bin(callee))
        .collect();

    if candidates.is_empty() {
        debug!("intra-bin optimizer: {:?} has no intra-bin candidates", func.func_id);
        return Ok(());
    }

    debug!(
        "intra-bin optimizer: {:?} rewriting {} intra-bin call site(s)",
        func.func_id,
        candidates.len()
    );

    let dead_cp = rewrite::rewrite_candidates(func, target, &candidates)?;

    if target.needs_cp_cleanup() {
        cleanup::renumber(func, &dead_cp)?;
    }

    Ok(())
}
