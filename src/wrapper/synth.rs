//! Wrapper synthesis driver (spec.md §4.5).
//!
//! Per pagerando function: apply the skip predicates, classify its
//! uses, decide whether a wrapper is needed, and if so build the
//! renamed original plus its trampoline.

use std::collections::HashSet;

use log::debug;
use smallvec::SmallVec;

use super::attrs::transfers_to_wrapper;
use super::classify::{needs_wrapper, should_skip};
use super::varargs::{rewrite_variadic, VariadicRewrite};
use crate::ir::{Attribute, Function, FuncId, Instruction, Linkage, Module, Type, UseSite, ValueId, Visibility};
use crate::result::PagerandoResult;

/// Per-function outcome of attempting wrapper synthesis (spec.md §7:
/// degenerate inputs are a silent skip, never an `Err`).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// A skip predicate matched (spec.md §4.5); the pagerando attribute
    /// was cleared and nothing else happened.
    Skipped,
    /// The function only has local linkage and no address-taken uses:
    /// direct intra-module calls already reach it, so no wrapper is
    /// needed.
    NoWrapperNeeded,
    /// A wrapper pair was built; `wrapper` is the new trampoline's id.
    Wrapped { wrapper: FuncId },
}

/// Run wrapper synthesis over every pagerando function in `module`.
///
/// Returns one [`Outcome`] per pagerando candidate visited, in module
/// order as of the snapshot taken at the start of the pass. Callers that
/// only care whether the POT global (spec.md §6) needs to be emitted
/// can check `outcomes.iter().any(|(_, o)| matches!(o, Outcome::Wrapped { .. }))`.
pub fn synthesize_wrappers(module: &mut Module) -> PagerandoResult<Vec<(FuncId, Outcome)>> {
    // Snapshot the function list up front: synthesis prepends new
    // wrapper functions as it goes, and those new functions are never
    // themselves pagerando candidates, so iterating a live view would
    // either skip nothing extra or (worse) re-visit a wrapper.
    let candidates: Vec<FuncId> = module.function_order.clone();
    let mut outcomes = Vec::new();

    for func_id in candidates {
        if !module.function(func_id).is_pagerando() {
            continue;
        }

        if should_skip(module.function(func_id)) {
            debug!("wrapper synthesis: skipping {}", module.function(func_id).name);
            module.function_mut(func_id).clear_attr(Attribute::Pagerando);
            outcomes.push((func_id, Outcome::Skipped));
            continue;
        }

        let uses = module.uses_of(func_id);
        if !needs_wrapper(module.function(func_id), &uses) {
            outcomes.push((func_id, Outcome::NoWrapperNeeded));
            continue;
        }

        let wrapper_id = build_wrapper(module, func_id, uses)?;
        outcomes.push((func_id, Outcome::Wrapped { wrapper: wrapper_id }));
    }

    Ok(outcomes)
}

fn build_wrapper(module: &mut Module, func_id: FuncId, uses: Vec<UseSite>) -> PagerandoResult<FuncId> {
    let original_name = module.function(func_id).name.clone();
    let linkage = module.function(func_id).linkage;
    let visibility = module.function(func_id).visibility;
    let comdat = module.function(func_id).comdat;
    let variadic = module.function(func_id).variadic;

    // Replacement policy is decided from F's state *before* the
    // variadic rewrite touches `variadic`/signature (spec.md §4.5).
    let replace_every_use = variadic || (!linkage.is_local() && visibility != Visibility::Protected);

    let original_signature = module.function(func_id).signature.clone();
    let original_attrs: Vec<Attribute> = module.function(func_id).attributes.iter().copied().collect();

    let variadic_rewrite = if variadic {
        Some(rewrite_variadic(module, func_id)?)
    } else {
        None
    };
    // A degenerate vararg (no va_start) is treated as non-variadic for
    // naming purposes too: no $$origva suffix, no va_list bracketing.
    let is_variadic_wrapper = matches!(variadic_rewrite, Some(VariadicRewrite::Rewritten { .. }));

    let suffix = if is_variadic_wrapper { "$$origva" } else { "$$orig" };
    module.function_mut(func_id).name = format!("{original_name}{suffix}");
    // The renamed original is only ever reached internally from here
    // on (by id, not by name); hide it regardless of F's prior
    // visibility (spec.md §8 scenarios 1 and 2 both rename to hidden).
    module.function_mut(func_id).visibility = Visibility::Hidden;

    let mut wrapper = Function::new(original_name.clone(), original_signature.clone());
    wrapper.linkage = linkage;
    wrapper.visibility = visibility;
    wrapper.comdat = comdat;
    wrapper.variadic = variadic && !is_variadic_wrapper;
    for attr in &original_attrs {
        if transfers_to_wrapper(*attr) {
            wrapper.set_attr(*attr);
        }
    }
    wrapper.set_attr(Attribute::NoInline);
    wrapper.set_attr(Attribute::OptimizeForSize);
    if matches!(linkage, Linkage::External) {
        // The wrapper owns the externally-visible name; protected
        // visibility stops the dynamic linker from letting some other
        // definition of it preempt this trampoline (spec.md §4.5).
        wrapper.visibility = Visibility::Protected;
    }

    build_wrapper_body(&mut wrapper, func_id, &variadic_rewrite);

    let wrapper_id = module.prepend_function(wrapper);

    apply_replacement_policy(module, func_id, wrapper_id, &uses, replace_every_use);

    Ok(wrapper_id)
}

/// Build W's single entry block: forward arguments (plus, for
/// variadics, a synthesized `va_list` bracket) to a direct call to the
/// renamed original, then return its result (spec.md §4.5 "Wrapper
/// body", §4.6 step 5).
fn build_wrapper_body(wrapper: &mut Function, callee: FuncId, variadic_rewrite: &Option<VariadicRewrite>) {
    let block = wrapper.create_block();

    let mut args: SmallVec<[ValueId; 4]> = SmallVec::new();
    for &ty in &wrapper.signature.params.clone() {
        let v = wrapper.new_value(ty);
        wrapper.params.push(v);
        args.push(v);
    }

    let mut va_list_slot = None;
    if let Some(VariadicRewrite::Rewritten { .. }) = variadic_rewrite {
        let slot = wrapper.new_value(Type::VaList);
        wrapper.push_inst(block, Instruction::Alloca { result: slot, ty: Type::VaList });
        wrapper.push_inst(block, Instruction::VaStart { valist: slot });
        args.push(slot);
        va_list_slot = Some(slot);
    }

    let ret_ty = wrapper.signature.ret;
    let result = ret_ty.map(|ty| wrapper.new_value(ty));
    wrapper.push_inst(
        block,
        Instruction::Call {
            callee,
            args,
            result,
        },
    );

    if let Some(slot) = va_list_slot {
        wrapper.push_inst(block, Instruction::VaEnd { valist: slot });
    }

    wrapper.push_inst(block, Instruction::Ret { value: result });
}

/// Apply spec.md §4.5's replacement policy over the uses collected
/// before the rename: either every use (non-local/variadic case) or
/// only the address-taken ones (local/protected case).
fn apply_replacement_policy(module: &mut Module, original: FuncId, wrapper: FuncId, uses: &[UseSite], replace_every_use: bool) {
    let mut visited = HashSet::new();
    for &use_site in uses {
        let should_replace = replace_every_use || use_site.is_address_taken();
        if !should_replace {
            continue;
        }
        if let UseSite::CalleeOfCall { caller, inst } = use_site {
            if replace_every_use {
                module.redirect_callee(caller, inst, wrapper);
            }
            continue;
        }
        module.replace_use(use_site, wrapper, &mut visited);
    }
    let _ = original;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Signature;

    /// spec.md §8 scenario 1 (calls.ll).
    #[test]
    fn external_function_gets_wrapper_and_internal_calls_are_untouched() {
        let mut module = Module::new();

        let mut global = Function::new("global", Signature::new(vec![], None));
        global.linkage = Linkage::External;
        global.set_attr(Attribute::Pagerando);
        let global_id = module.declare_function(global);

        let mut internal = Function::new("internal", Signature::new(vec![], None));
        internal.set_attr(Attribute::Pagerando);
        let internal_id = module.declare_function(internal);

        let mut user = Function::new("user", Signature::new(vec![], None));
        user.set_attr(Attribute::Pagerando);
        let user_block = user.create_block();
        user.push_inst(
            user_block,
            Instruction::Call {
                callee: global_id,
                args: Default::default(),
                result: None,
            },
        );
        user.push_inst(
            user_block,
            Instruction::Call {
                callee: internal_id,
                args: Default::default(),
                result: None,
            },
        );
        let user_id = module.declare_function(user);

        synthesize_wrappers(&mut module).unwrap();

        assert_eq!(module.function(global_id).name, "global$$orig");
        assert!(module.function(global_id).is_pagerando());
        assert_eq!(module.function(global_id).visibility, Visibility::Hidden);

        let wrapper_id = module.find_function_by_name("global").expect("wrapper named global");
        assert!(!module.function(wrapper_id).is_pagerando());
        assert!(module.function(wrapper_id).has_attr(Attribute::NoInline));
        assert!(module.function(wrapper_id).has_attr(Attribute::OptimizeForSize));

        // internal had no address-taken uses and stayed local: no wrapper.
        assert_eq!(module.function(internal_id).name, "internal");
        assert!(module.function(internal_id).is_pagerando());

        // user's call to `global` was redirected to the wrapper (the
        // external case replaces every use); its call to `internal`
        // kept the direct faster path.
        let user = module.function(user_id);
        let callees: Vec<FuncId> = user
            .all_insts()
            .filter_map(|id| match &user.insts[id] {
                Instruction::Call { callee, .. } => Some(*callee),
                _ => None,
            })
            .collect();
        assert!(callees.contains(&wrapper_id));
        assert!(callees.contains(&internal_id));
        assert!(!callees.contains(&global_id));
    }

    /// spec.md §8 scenario 2 (address-taken.ll).
    #[test]
    fn address_taken_local_function_gets_wrapper_via_global_initializer() {
        use crate::ir::module::GlobalVar;

        let mut module = Module::new();
        let mut f = Function::new("internal", Signature::new(vec![], None));
        f.set_attr(Attribute::Pagerando);
        let func_id = module.declare_function(f);

        let global = module.globals.push(GlobalVar {
            name: "fn_ptr1".to_string(),
            initializer: Some(func_id),
        });
        synthesize_wrappers(&mut module).unwrap();

        assert_eq!(module.function(func_id).name, "internal$$orig");
        assert_eq!(module.function(func_id).visibility, Visibility::Hidden);
        let wrapper_id = module.find_function_by_name("internal").unwrap();
        assert_eq!(module.globals[global].initializer, Some(wrapper_id));
    }

    /// spec.md §8 scenario 3 (varargs.ll).
    #[test]
    fn variadic_function_gets_va_list_threaded_wrapper() {
        let mut module = Module::new();
        let mut f = Function::new("varags", Signature::new(vec![Type::I32], None));
        f.variadic = true;
        f.set_attr(Attribute::Pagerando);
        let block = f.create_block();
        let alloca = f.new_value(Type::VaList);
        f.push_inst(block, Instruction::Alloca { result: alloca, ty: Type::VaList });
        f.push_inst(block, Instruction::VaStart { valist: alloca });
        f.push_inst(block, Instruction::VaEnd { valist: alloca });
        f.push_inst(block, Instruction::Ret { value: None });
        let func_id = module.declare_function(f);

        synthesize_wrappers(&mut module).unwrap();

        assert_eq!(module.function(func_id).name, "varags$$origva");
        assert!(!module.function(func_id).variadic);
        assert!(module
            .function(func_id)
            .all_insts()
            .all(|id| !matches!(module.function(func_id).insts[id], Instruction::VaStart { .. })));

        let wrapper_id = module.find_function_by_name("varags").unwrap();
        let wrapper = module.function(wrapper_id);
        assert!(wrapper.all_insts().any(|id| matches!(wrapper.insts[id], Instruction::Alloca { .. })));
        assert!(wrapper.all_insts().any(|id| matches!(wrapper.insts[id], Instruction::VaStart { .. })));
        assert!(wrapper.all_insts().any(|id| matches!(wrapper.insts[id], Instruction::VaEnd { .. })));
        let has_call_to_orig = wrapper
            .all_insts()
            .any(|id| matches!(&wrapper.insts[id], Instruction::Call { callee, .. } if *callee == func_id));
        assert!(has_call_to_orig);
    }
}
