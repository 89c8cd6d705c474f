//! Entity references into a [`Module`](super::module::Module).
//!
//! Mirrors `cranelift_codegen::ir::entities`: each entity kind gets its
//! own newtype over a dense `u32` index so that, say, a [`BlockId`] and a
//! [`ValueId`] can never be confused even though both are "just a
//! number" underneath.

use cranelift_entity::entity_impl;

/// A function in the module, identified independent of its current name
/// (names get rewritten during wrapper synthesis; the id doesn't).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FuncId(u32);
entity_impl!(FuncId, "func");

/// A basic block within a function body.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// An instruction within a function body.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct InstId(u32);
entity_impl!(InstId, "inst");

/// An SSA value: an instruction result or a function parameter.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ValueId(u32);
entity_impl!(ValueId, "v");

/// A module-level global variable (used for function-pointer
/// initializers such as `fn_ptr1` / `fn_ptr2` in spec.md's
/// address-taken scenario).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct GlobalId(u32);
entity_impl!(GlobalId, "gv");

/// A module-level alias to a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct AliasId(u32);
entity_impl!(AliasId, "alias");

/// A constant expression (e.g. a bitcast) that refers to a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ConstantId(u32);
entity_impl!(ConstantId, "const");
