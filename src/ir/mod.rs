//! IR-level data model (spec.md §3): functions, uses, and the module
//! that owns them. See SPEC_FULL.md §A.2 for why this crate concretely
//! owns this surface rather than treating it purely abstractly.

pub mod entities;
pub mod function;
pub mod module;
pub mod uses;

pub use entities::{AliasId, BlockId, ConstantId, FuncId, GlobalId, InstId, ValueId};
pub use function::{Attribute, Function, Instruction, Linkage, Signature, Type, Visibility};
pub use module::Module;
pub use uses::{UseKind, UseSite};
