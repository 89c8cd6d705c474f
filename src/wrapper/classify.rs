//! Skip predicates and the wrapper-need decision (spec.md §4.5).

use crate::ir::{Attribute, Function, UseSite};

/// Whether `func` should be skipped by wrapper synthesis entirely. When
/// this holds and `func` carries the pagerando attribute, the caller
/// must clear it and proceed no further (spec.md §4.5).
pub fn should_skip(func: &Function) -> bool {
    func.is_declaration
        || func.is_available_externally
        || func.comdat
        || func.is_trap_only_abstract_destructor()
        || func.has_attr(Attribute::Naked)
        || func.has_attr(Attribute::Thunk)
}

/// A wrapper is needed iff `func` has non-local linkage or at least one
/// address-taken use exists (spec.md §4.5 "Wrapper need").
pub fn needs_wrapper(func: &Function, uses: &[UseSite]) -> bool {
    !func.linkage.is_local() || uses.iter().any(UseSite::is_address_taken)
}
