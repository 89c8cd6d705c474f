//! Shared configuration threaded through the three passes.
//!
//! Plays the role `cranelift_codegen::settings::Flags` plays for the rest
//! of that pipeline: a plain value built once per module compilation and
//! passed by reference into whichever pass needs it.

/// Bin-assignment strategy selector (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
    /// First-fit only, in module order.
    Simple,
    /// SCC clustering of the pagerando call graph, then first-fit.
    #[default]
    Callgraph,
}

/// Configuration shared by bin assignment and (indirectly) the other
/// passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Page size in bytes; the capacity of a single bin. Must be a power
    /// of two. Default 4096 (one page).
    pub bin_capacity: u32,
    /// Floor applied by the size estimator so that trivially empty
    /// functions still occupy a unit, and a corresponding floor under
    /// which a bin is considered full. Default 2 bytes.
    pub min_function_size: u32,
    /// Which bin-assignment strategy the driver should run.
    pub strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bin_capacity: 4096,
            min_function_size: 2,
            strategy: Strategy::default(),
        }
    }
}

impl Config {
    /// Construct a config with an explicit bin capacity, keeping the
    /// other defaults.
    pub fn with_capacity(bin_capacity: u32) -> Self {
        Config {
            bin_capacity,
            ..Config::default()
        }
    }
}
