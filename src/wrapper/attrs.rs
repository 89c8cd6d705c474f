//! Attribute copy policy for wrapper construction (spec.md §4.5, §9).
//!
//! The source implementation's allow-list evolved across variants; the
//! spec resolves this as an explicit table, with unknown attribute
//! kinds treated conservatively as "do not copy" (spec.md §6
//! "Attribute-copy policy").

use crate::ir::Attribute;

/// Whether `attr` is safe to carry over onto a thin trampoline.
///
/// `noinline` and `optimize-for-size` are not part of this table: the
/// wrapper always gets both regardless of what `F` carried (spec.md
/// §4.5 "Always add").
pub fn transfers_to_wrapper(attr: Attribute) -> bool {
    matches!(
        attr,
        Attribute::Cold | Attribute::Convergent | Attribute::Sanitizer | Attribute::Uwtable | Attribute::StackAlignment
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagerando_and_naked_never_transfer() {
        assert!(!transfers_to_wrapper(Attribute::Pagerando));
        assert!(!transfers_to_wrapper(Attribute::Naked));
        assert!(!transfers_to_wrapper(Attribute::Thunk));
    }

    #[test]
    fn unknown_attributes_are_denied_by_default() {
        assert!(!transfers_to_wrapper(Attribute::Other("no_frame_pointer_elim")));
    }

    #[test]
    fn cold_and_sanitizer_transfer() {
        assert!(transfers_to_wrapper(Attribute::Cold));
        assert!(transfers_to_wrapper(Attribute::Sanitizer));
        assert!(transfers_to_wrapper(Attribute::Uwtable));
        assert!(transfers_to_wrapper(Attribute::StackAlignment));
        assert!(transfers_to_wrapper(Attribute::Convergent));
    }
}
