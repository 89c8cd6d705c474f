//! Wrapper synthesis (spec.md §4.5–§4.6): isolates pagerando-enabled
//! functions behind non-randomized trampolines, and rewrites variadic
//! functions so argument tails survive the indirection.

pub mod attrs;
pub mod classify;
pub mod synth;
pub mod varargs;

pub use synth::{synthesize_wrappers, Outcome};
pub use varargs::{rewrite_variadic, VariadicRewrite};
