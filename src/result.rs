//! Error types for the pagerando core.
//!
//! Per the failure taxonomy this core follows: degenerate inputs (a
//! declaration-only function, a comdat function, and so on) are not
//! errors at all — they are silently skipped and never reach this type.
//! Only the invariant-violation class described below is represented
//! here, and encountering one means the implementation has a bug, not
//! that the input was bad.

use crate::ir::entities::FuncId;
use crate::mir::CpIndex;

/// Result type used throughout this crate's pass entry points.
pub type PagerandoResult<T> = Result<T, PagerandoError>;

/// Invariant violations the three passes can detect in themselves.
///
/// None of these are meant to be handled by a caller beyond surfacing
/// them as a compilation failure; they exist as `Result` values rather
/// than panics only because a library core should not unilaterally
/// abort its host's process.
#[derive(Debug, thiserror::Error)]
pub enum PagerandoError {
    /// A `va_start` site's originating stack allocation could not be
    /// traced back to a single `alloca`, so the va_list type is unknown.
    #[error("function {0:?}: could not resolve va_list type from va_start site")]
    UnresolvedVaListType(FuncId),

    /// The intra-bin optimizer's def-use closure reached a call
    /// instruction whose opcode `toDirectCall` does not know how to
    /// rewrite.
    #[error("function {0:?}: unhandled call opcode in direct-call rewrite")]
    UnhandledCallOpcode(FuncId),

    /// After constant-pool cleanup, a surviving use still refers to an
    /// index that cleanup marked for deletion.
    #[error("function {0:?}: constant-pool use at index {1:?} maps to a deleted entry")]
    DanglingConstantPoolUse(FuncId, CpIndex),

    /// A wrapper pair was requested for a function that does not meet
    /// the precondition (e.g. asking for a variadic rewrite on a
    /// non-variadic function). Indicates a caller bug in this crate's
    /// own pipeline wiring, not a property of the input module.
    #[error("function {0:?}: wrapper synthesis precondition violated: {1}")]
    PreconditionViolated(FuncId, &'static str),
}
