//! The Page-Offset Table global (spec.md §6 "POT global").
//!
//! Wrapper synthesis (§4.5) indirects every externally-visible
//! pagerando function through a POT entry; this module owns the one
//! piece of module-level bookkeeping that indirection needs standing
//! up: a single `llvm.pot` array-of-pointer global, emitted at most
//! once per module and kept alive across dead-global elimination by
//! appending it to the module's "used" list.

use crate::ir::module::GlobalVar;
use crate::ir::{GlobalId, Module, Visibility};

/// Symbol name of the POT global (spec.md §6). Fixed: the loader
/// machinery this core hands off to looks it up by this exact name.
pub const POT_SYMBOL: &str = "llvm.pot";

/// Emit the module's `llvm.pot` global if it does not already exist.
///
/// Idempotent: calling this more than once (e.g. because a caller
/// re-runs wrapper synthesis) never creates a second global. Returns the
/// global's id either way.
///
/// Per spec.md §6, the global is protected-visibility and appended to
/// the module's "used" list so the linker's dead-global elimination
/// never strips it before the runtime loader populates its contents.
pub fn emit_pot_global(module: &mut Module) -> GlobalId {
    if let Some(id) = find_pot_global(module) {
        return id;
    }

    let id = module.globals.push(GlobalVar {
        name: POT_SYMBOL.to_string(),
        initializer: None,
    });
    module.used_list.push(POT_SYMBOL.to_string());
    id
}

/// Emit the POT global iff `wrapped_any` holds (spec.md §6: "emitted
/// exactly once per module, if any wrapping happened"). Intended to be
/// called with the result of [`crate::wrapper::synthesize_wrappers`]:
/// `emit_pot_global_if_needed(module, outcomes.iter().any(|(_, o)| matches!(o, Outcome::Wrapped { .. })))`.
pub fn emit_pot_global_if_needed(module: &mut Module, wrapped_any: bool) -> Option<GlobalId> {
    wrapped_any.then(|| emit_pot_global(module))
}

fn find_pot_global(module: &Module) -> Option<GlobalId> {
    module.globals.iter().find(|(_, g)| g.name == POT_SYMBOL).map(|(id, _)| id)
}

/// Whether a global visibility is acceptable for the POT global
/// (protected, per spec.md §6). Exposed for fixtures/tests that want to
/// assert the invariant without reaching into `Module` internals; the
/// core's minimal `GlobalVar` type does not itself carry a visibility
/// field, so this is a documentation-level contract callers that do
/// model global visibility should uphold.
pub fn pot_visibility() -> Visibility {
    Visibility::Protected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attribute, Function, Signature};

    #[test]
    fn emits_exactly_one_global_named_llvm_pot() {
        let mut module = Module::new();
        let id1 = emit_pot_global(&mut module);
        let id2 = emit_pot_global(&mut module);
        assert_eq!(id1, id2);
        assert_eq!(module.globals.iter().filter(|(_, g)| g.name == POT_SYMBOL).count(), 1);
    }

    #[test]
    fn appended_to_used_list() {
        let mut module = Module::new();
        emit_pot_global(&mut module);
        assert!(module.used_list.contains(&POT_SYMBOL.to_string()));
    }

    #[test]
    fn not_emitted_when_no_wrapping_happened() {
        let mut module = Module::new();
        let f = Function::new("local_only", Signature::new(vec![], None));
        let _ = module.declare_function(f);
        let got = emit_pot_global_if_needed(&mut module, false);
        assert!(got.is_none());
        assert!(module.globals.is_empty());
    }

    #[test]
    fn emitted_once_end_to_end_after_wrapper_synthesis() {
        let mut module = Module::new();
        let mut f = Function::new("global", Signature::new(vec![], None));
        f.linkage = crate::ir::Linkage::External;
        f.set_attr(Attribute::Pagerando);
        module.declare_function(f);

        let outcomes = crate::wrapper::synthesize_wrappers(&mut module).unwrap();
        let wrapped_any = outcomes
            .iter()
            .any(|(_, o)| matches!(o, crate::wrapper::Outcome::Wrapped { .. }));
        assert!(wrapped_any);

        emit_pot_global_if_needed(&mut module, wrapped_any);
        assert_eq!(module.globals.iter().filter(|(_, g)| g.name == POT_SYMBOL).count(), 1);
    }
}
