//! Use classification (spec.md §3 "Use", §9 "Use classification across
//! heterogeneous user kinds").
//!
//! The source implementation this was distilled from branches over
//! runtime types (bitcast expressions, aliases, block-address
//! constants, personality references, call sites). Re-architected here
//! as a single total function over a tagged `UseSite` variant, per
//! spec.md §9's explicit recommendation.

use super::entities::{AliasId, BlockId, ConstantId, FuncId, GlobalId, InstId};

/// A directed edge from a user IR entity to a function value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UseSite {
    /// The function is the target of a call instruction.
    CalleeOfCall { caller: FuncId, inst: InstId },
    /// A global alias's aliasee.
    AliasTarget { alias: AliasId },
    /// A `blockaddress` constant referencing a block in the function.
    BlockAddress { function: FuncId, block: BlockId },
    /// The function is referenced as an exception-handling personality.
    PersonalityRef { function: FuncId },
    /// A bitcast (or similar no-op conversion) constant expression.
    /// `all_uses_skippable` records whether *every* transitive use of
    /// this constant is itself one of the other skippable kinds above
    /// (the recursive case in spec.md §3); this crate does not model
    /// arbitrarily deep constant-expression chains, so the recursion is
    /// collapsed into a single precomputed flag.
    Bitcast {
        constant: ConstantId,
        all_uses_skippable: bool,
    },
    /// A global variable's initializer.
    GlobalInitializer { global: GlobalId },
    /// Anything else: the function's address is observably taken and
    /// may leak to another compilation unit at runtime. `description` is
    /// diagnostic only (e.g. "stored to local", "passed as argument").
    AddressTaken { description: &'static str },
}

/// The classification spec.md §3 assigns to a [`UseSite`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UseKind {
    CalleeOfCall,
    AliasTarget,
    BlockAddress,
    PersonalityRef,
    /// A bitcast use all of whose further uses are themselves
    /// skippable.
    BitcastOnlyOfSkippableUses,
    AddressTaken,
}

impl UseSite {
    /// Classify this use. Total: every `UseSite` variant maps to
    /// exactly one `UseKind`.
    pub fn classify(&self) -> UseKind {
        match self {
            UseSite::CalleeOfCall { .. } => UseKind::CalleeOfCall,
            UseSite::AliasTarget { .. } => UseKind::AliasTarget,
            UseSite::BlockAddress { .. } => UseKind::BlockAddress,
            UseSite::PersonalityRef { .. } => UseKind::PersonalityRef,
            UseSite::Bitcast {
                all_uses_skippable, ..
            } => {
                if *all_uses_skippable {
                    UseKind::BitcastOnlyOfSkippableUses
                } else {
                    UseKind::AddressTaken
                }
            }
            // A global-variable initializer is a skippable non-address
            // use only when the initializer itself is read-only data
            // that nothing re-exports as a pointer; spec.md §4.5 treats
            // initializer uses as address-taken uses requiring
            // replacement, consistent with "global-variable initializer"
            // being named explicitly as one of the replacement-strategy
            // user kinds.
            UseSite::GlobalInitializer { .. } => UseKind::AddressTaken,
            UseSite::AddressTaken { .. } => UseKind::AddressTaken,
        }
    }

    /// Per spec.md §3: "address-taken uses are the only ones that can
    /// leak a function pointer to another module at runtime."
    pub fn is_address_taken(&self) -> bool {
        matches!(self.classify(), UseKind::AddressTaken)
    }
}
