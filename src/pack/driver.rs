//! Bin assignment driver (spec.md §4.4).
//!
//! Estimates every pagerando function's size, dispatches on
//! [`Strategy`](crate::settings::Strategy), and writes the resulting bin
//! id back onto each function as a `.bin_<id>` section prefix.

use log::debug;
use rustc_hash::FxHashMap;

use super::{pack_call_graph, BinId, CallGraphBuilder, FirstFitPacker};
use crate::ir::{FuncId, Module};
use crate::mir::MachFunction;
use crate::settings::{Config, Strategy};
use crate::size::{estimate_size, InstructionSizer};

/// Drives bin assignment over a set of lowered, pagerando-eligible
/// functions. Holds no state across invocations; construct one per pass
/// run.
pub struct BinAssignmentDriver<'a> {
    config: &'a Config,
}

impl<'a> BinAssignmentDriver<'a> {
    pub fn new(config: &'a Config) -> Self {
        BinAssignmentDriver { config }
    }

    /// Run bin assignment over `functions`, writing each assigned
    /// function's `bin_prefix` in place. `module` supplies `is_pagerando`
    /// gating via its IR-level function records; functions absent a
    /// matching IR entry are treated as not pagerando.
    ///
    /// `call_edges` lists caller-to-callee edges between pagerando
    /// functions, used only by [`Strategy::Callgraph`]; ignored under
    /// [`Strategy::Simple`]. Must be ordered bottom-up (an edge's callee
    /// has no remaining outgoing edges still to be added when the edge
    /// itself is added), matching [`CallGraphBuilder::add_edge`]'s
    /// contract.
    pub fn run(
        &self,
        module: &Module,
        functions: &mut [MachFunction],
        sizer: &dyn InstructionSizer,
        call_edges: &[(FuncId, FuncId)],
    ) {
        let pagerando: Vec<usize> = functions
            .iter()
            .enumerate()
            .filter(|(_, f)| self.is_pagerando(module, f))
            .map(|(i, _)| i)
            .collect();

        if pagerando.is_empty() {
            debug!("bin assignment: no pagerando functions, nothing to do");
            return;
        }

        let sizes: FxHashMap<FuncId, u32> = pagerando
            .iter()
            .map(|&i| {
                let f = &functions[i];
                (f.func_id, estimate_size(f, sizer, self.config.min_function_size))
            })
            .collect();

        let mapping = match self.config.strategy {
            Strategy::Simple => self.assign_simple(&pagerando, functions, &sizes),
            Strategy::Callgraph => self.assign_callgraph(&pagerando, functions, &sizes, call_edges),
        };

        for &i in &pagerando {
            let f = &mut functions[i];
            if let Some(&bin) = mapping.get(&f.func_id) {
                f.bin_prefix = Some(format!(".bin_{bin}"));
            }
        }
    }

    fn is_pagerando(&self, module: &Module, f: &MachFunction) -> bool {
        module.function(f.func_id).is_pagerando()
    }

    fn assign_simple(
        &self,
        pagerando: &[usize],
        functions: &[MachFunction],
        sizes: &FxHashMap<FuncId, u32>,
    ) -> FxHashMap<FuncId, BinId> {
        let mut packer = FirstFitPacker::new(self.config);
        let mut mapping = FxHashMap::default();
        for &i in pagerando {
            let func_id = functions[i].func_id;
            let size = sizes[&func_id];
            mapping.insert(func_id, packer.assign(size));
        }
        mapping
    }

    fn assign_callgraph(
        &self,
        pagerando: &[usize],
        functions: &[MachFunction],
        sizes: &FxHashMap<FuncId, u32>,
        call_edges: &[(FuncId, FuncId)],
    ) -> FxHashMap<FuncId, BinId> {
        let mut builder = CallGraphBuilder::new();
        let mut node_of: FxHashMap<FuncId, super::NodeId> = FxHashMap::default();
        for &i in pagerando {
            let func_id = functions[i].func_id;
            let node = builder.add_node(vec![func_id], sizes[&func_id]);
            node_of.insert(func_id, node);
        }
        for &(caller, callee) in call_edges {
            if let (Some(&c), Some(&e)) = (node_of.get(&caller), node_of.get(&callee)) {
                builder.add_edge(c, e);
            }
        }
        let mut nodes = builder.finish();
        let mut packer = FirstFitPacker::new(self.config);
        pack_call_graph(&mut nodes, &mut packer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Attribute, Function, Signature};
    use crate::size::DefaultSizer;

    fn pagerando_module(count: usize) -> (Module, Vec<MachFunction>) {
        let mut module = Module::new();
        let mut functions = Vec::new();
        for i in 0..count {
            let mut f = Function::new(format!("f{i}"), Signature::new(vec![], None));
            f.set_attr(Attribute::Pagerando);
            let id = module.declare_function(f);
            let mut mach = MachFunction::new(id);
            mach.is_pagerando = true;
            let block = mach.create_block();
            // Small enough that two of these together still fit one
            // 4096-byte bin (`callgraph_strategy_co_locates_caller_and_callee`
            // below relies on the cluster not exceeding capacity).
            for _ in 0..10 {
                mach.push_inst(block, crate::mir::MachInst::Other { bytes: 64 });
            }
            functions.push(mach);
        }
        (module, functions)
    }

    #[test]
    fn simple_strategy_assigns_and_sets_prefix() {
        let (module, mut functions) = pagerando_module(3);
        let config = Config::with_capacity(4096);
        let driver = BinAssignmentDriver::new(&config);
        driver.run(&module, &mut functions, &DefaultSizer, &[]);
        for f in &functions {
            assert!(f.bin_prefix.as_deref().unwrap().starts_with(".bin_"));
        }
    }

    #[test]
    fn non_pagerando_functions_are_left_unbinned() {
        let mut module = Module::new();
        let f = Function::new("not_pagerando", Signature::new(vec![], None));
        let id = module.declare_function(f);
        let mut mach = MachFunction::new(id);
        mach.is_pagerando = false;
        let mut functions = vec![mach];

        let config = Config::with_capacity(4096);
        let driver = BinAssignmentDriver::new(&config);
        driver.run(&module, &mut functions, &DefaultSizer, &[]);
        assert!(functions[0].bin_prefix.is_none());
    }

    #[test]
    fn callgraph_strategy_co_locates_caller_and_callee() {
        let (module, mut functions) = pagerando_module(2);
        let caller = functions[0].func_id;
        let callee = functions[1].func_id;
        let config = Config {
            strategy: Strategy::Callgraph,
            ..Config::with_capacity(4096)
        };
        let driver = BinAssignmentDriver::new(&config);
        driver.run(&module, &mut functions, &DefaultSizer, &[(caller, callee)]);
        assert_eq!(functions[0].bin_prefix, functions[1].bin_prefix);
    }
}
