//! The IR-level function representation (spec.md §3 "Function").
//!
//! This is the minimal concrete surface the wrapper synthesizer (§4.5)
//! and variadic rewrite (§4.6) need: enough to rename a function, flip
//! its linkage/visibility, walk and rewrite its instructions, and build
//! a trampoline body. A real host compiler's IR (LLVM's, in the system
//! this core was distilled from) carries a great deal more; see
//! SPEC_FULL.md §A.2 for why this crate stops here.

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;

use super::entities::{BlockId, InstId, ValueId};

/// A function's linkage, as seen by other compilation units.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Linkage {
    /// Not visible outside this compilation unit.
    Local,
    /// Visible to (and possibly preemptable by) other compilation units.
    External,
}

impl Linkage {
    pub fn is_local(self) -> bool {
        matches!(self, Linkage::Local)
    }
}

/// A function's visibility, independent of linkage (spec.md §3).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Visibility {
    #[default]
    Default,
    Hidden,
    Protected,
}

/// Attributes tracked on a function. This is not an exhaustive model of
/// every attribute a host IR might carry — only the ones the wrapper
/// synthesizer reads, sets, clears, or must decide whether to copy onto
/// a trampoline (spec.md §4.5, §9).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Attribute {
    /// Marks the function as eligible for binning (spec.md §6).
    Pagerando,
    /// Function body is a single unreachable trap (part of the
    /// abstract-destructor skip predicate, spec.md §4.5).
    Naked,
    Thunk,
    NoInline,
    OptimizeForSize,
    Cold,
    Convergent,
    Sanitizer,
    Uwtable,
    StackAlignment,
    /// Catch-all for attributes this crate does not otherwise model,
    /// e.g. alignment hints or inlining hints that never need to be
    /// inspected by name, only copied-or-not via the allow-list.
    Other(&'static str),
}

/// A minimal value-type lattice, just enough to describe signatures and
/// to carry the `alloca` type a `va_list` is traced back to (spec.md
/// §4.6 step 2).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Type {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    /// The target's opaque `va_list` aggregate (spec.md §3 "va_list
    /// type"); the core never looks inside it.
    VaList,
}

/// A function signature: parameter types plus an optional return type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Option<Type>,
    pub call_conv: String,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Option<Type>) -> Self {
        Signature {
            params,
            ret,
            call_conv: "C".to_string(),
        }
    }

    /// The signature of a wrapper that forwards to this one unchanged
    /// plus, for variadic rewrite, a trailing `va_list*` parameter.
    pub fn with_trailing_va_list(&self) -> Self {
        let mut params = self.params.clone();
        params.push(Type::Ptr);
        Signature {
            params,
            ret: self.ret,
            call_conv: self.call_conv.clone(),
        }
    }
}

/// One instruction in an IR-level function body.
///
/// This enumerates only the instruction shapes the three passes care
/// about. Everything else a real function body contains is represented
/// as [`Instruction::Opaque`] so that functions can carry realistic
/// filler without this crate needing to model arbitrary IR.
#[derive(Clone, Debug)]
pub enum Instruction {
    /// A call through the function's own instruction stream. This is a
    /// "callee use" in spec.md §3's Use taxonomy: never address-taken.
    Call {
        callee: super::entities::FuncId,
        args: SmallVec<[ValueId; 4]>,
        result: Option<ValueId>,
    },
    /// Stack allocation; used to trace `va_list` storage (spec.md §4.6).
    Alloca { result: ValueId, ty: Type },
    VaStart { valist: ValueId },
    VaCopy { dest: ValueId, src: ValueId },
    VaEnd { valist: ValueId },
    Ret { value: Option<ValueId> },
    /// Placeholder for any instruction irrelevant to these passes.
    Opaque,
}

/// A basic block: an ordered instruction list.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub insts: Vec<InstId>,
}

/// An IR-level function (spec.md §3).
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub variadic: bool,
    pub signature: Signature,
    pub attributes: BTreeSet<Attribute>,
    /// Set by bin assignment (spec.md §4.4); `None` means unbinned.
    pub section_prefix: Option<String>,
    /// True for a declaration with no body.
    pub is_declaration: bool,
    pub is_available_externally: bool,
    pub comdat: bool,
    /// Entry block is trap-only (debug info + trap + unreachable), the
    /// abstract-destructor skip predicate from spec.md §4.5. This crate
    /// does not model trap/unreachable as distinct opcodes, so fixtures
    /// set this directly rather than it being derived from `insts`.
    pub is_trap_only: bool,
    pub blocks: PrimaryMap<BlockId, Block>,
    pub insts: PrimaryMap<InstId, Instruction>,
    pub values: PrimaryMap<ValueId, Type>,
    pub entry_block: Option<BlockId>,
    /// Params in order; each is bound to a [`ValueId`] in `values`.
    pub params: Vec<ValueId>,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Function {
            name: name.into(),
            linkage: Linkage::Local,
            visibility: Visibility::Default,
            variadic: false,
            signature,
            attributes: BTreeSet::new(),
            section_prefix: None,
            is_declaration: false,
            is_available_externally: false,
            comdat: false,
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            values: PrimaryMap::new(),
            entry_block: None,
            params: Vec::new(),
            is_trap_only: false,
        }
    }

    pub fn has_attr(&self, attr: Attribute) -> bool {
        self.attributes.contains(&attr)
    }

    pub fn set_attr(&mut self, attr: Attribute) {
        self.attributes.insert(attr);
    }

    pub fn clear_attr(&mut self, attr: Attribute) {
        self.attributes.remove(&attr);
    }

    pub fn is_pagerando(&self) -> bool {
        self.has_attr(Attribute::Pagerando)
    }

    /// Allocate a new block and make it the entry block if none exists
    /// yet.
    pub fn create_block(&mut self) -> BlockId {
        let block = self.blocks.push(Block::default());
        if self.entry_block.is_none() {
            self.entry_block = Some(block);
        }
        block
    }

    pub fn push_inst(&mut self, block: BlockId, inst: Instruction) -> InstId {
        let id = self.insts.push(inst);
        self.blocks[block].insts.push(id);
        id
    }

    pub fn new_value(&mut self, ty: Type) -> ValueId {
        self.values.push(ty)
    }

    /// All instructions across all blocks, in layout order.
    pub fn all_insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.blocks.values().flat_map(|b| b.insts.iter().copied())
    }

    /// The abstract-destructor trap-only skip predicate (spec.md §4.5).
    pub fn is_trap_only_abstract_destructor(&self) -> bool {
        self.is_trap_only
    }

    pub fn mark_trap_only(&mut self) {
        self.is_trap_only = true;
    }

    /// Remove an instruction's id from whatever block contains it. Used
    /// by variadic rewrite to erase a superseded `alloca`/`va_start`
    /// (spec.md §4.6).
    pub fn remove_inst(&mut self, inst: InstId) {
        for block in self.blocks.values_mut() {
            if let Some(pos) = block.insts.iter().position(|&i| i == inst) {
                block.insts.remove(pos);
                break;
            }
        }
    }

    /// Replace every operand occurrence of `old` with `new` across this
    /// function's instructions. Used to retarget uses of a superseded
    /// `va_list` allocation onto the wrapper's trailing parameter
    /// (spec.md §4.6 step 4).
    pub fn replace_value(&mut self, old: ValueId, new: ValueId) {
        let replace = |v: &mut ValueId| {
            if *v == old {
                *v = new;
            }
        };
        for inst in self.insts.values_mut() {
            match inst {
                Instruction::Call { args, .. } => {
                    for arg in args.iter_mut() {
                        replace(arg);
                    }
                }
                Instruction::VaStart { valist } | Instruction::VaEnd { valist } => replace(valist),
                Instruction::VaCopy { dest, src } => {
                    replace(dest);
                    replace(src);
                }
                Instruction::Ret { value: Some(value) } => replace(value),
                Instruction::Ret { value: None } | Instruction::Alloca { .. } | Instruction::Opaque => {}
            }
        }
    }
}
