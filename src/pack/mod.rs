//! Bin assignment (spec.md §4.2–§4.4): the first-fit packer, the
//! call-graph-aware clustering pass built on top of it, and the driver
//! that dispatches between the two strategies.

pub mod call_graph;
pub mod driver;
pub mod first_fit;

use std::fmt;

pub use call_graph::{pack_call_graph, CallGraphBuilder, CallGraphNode, NodeId};
pub use driver::BinAssignmentDriver;
pub use first_fit::FirstFitPacker;

/// A bin id. `0` is reserved to mean "unbinned"; the first valid bin is
/// `1` (spec.md §3 "Bin").
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BinId(u32);

impl BinId {
    /// Construct a bin id. Panics if `n` is zero: callers should never
    /// observe bin `0`, which is reserved to mean "unbinned" and is
    /// never handed out by [`FirstFitPacker::assign`].
    pub fn new(n: u32) -> Self {
        assert_ne!(n, 0, "bin id 0 is reserved for \"unbinned\"");
        BinId(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
