//! Call-graph-aware bin assignment (spec.md §4.3).
//!
//! Operates on pagerando functions only, one node per strongly-connected
//! component of the pagerando-only sub-call-graph. SCC construction and
//! iteration are the host compiler's call-graph analysis's job (spec.md
//! §1); this module only requires that its caller adds nodes in
//! bottom-up order (callees before callers), per the "SCC graph as an
//! indexed arena" design note in spec.md §9.

use std::collections::{HashSet, VecDeque};

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use super::{BinId, FirstFitPacker};
use crate::ir::FuncId;

/// One strongly-connected component of the pagerando call graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);
entity_impl!(NodeId, "cgnode");

/// A call-graph node (spec.md §3 "Call-graph node").
#[derive(Clone, Debug)]
pub struct CallGraphNode {
    pub members: Vec<FuncId>,
    pub self_size: u32,
    /// self size + every transitively reachable callee's size, as of
    /// the last `add_edge`/assignment-loop update.
    pub transitive_size: u32,
    pub callers: HashSet<NodeId>,
    pub callees: HashSet<NodeId>,
}

/// Builds the call-graph node arena. The caller (normally an adapter
/// over the host's SCC analysis) must call [`add_node`](Self::add_node)
/// bottom-up and [`add_edge`](Self::add_edge) only after both of an
/// edge's endpoints exist.
#[derive(Default)]
pub struct CallGraphBuilder {
    nodes: PrimaryMap<NodeId, CallGraphNode>,
}

impl CallGraphBuilder {
    pub fn new() -> Self {
        CallGraphBuilder::default()
    }

    /// Add a node for one SCC containing at least one pagerando
    /// function. `self_size` is the sum of its members' estimated
    /// sizes.
    pub fn add_node(&mut self, members: Vec<FuncId>, self_size: u32) -> NodeId {
        self.nodes.push(CallGraphNode {
            members,
            self_size,
            transitive_size: self_size,
            callers: HashSet::new(),
            callees: HashSet::new(),
        })
    }

    /// Record a caller-to-callee edge crossing SCC boundaries between
    /// two pagerando nodes. Because `add_node` runs bottom-up, `callee`
    /// is already final, so `caller`'s transitive size accumulates
    /// incrementally (spec.md §4.3).
    pub fn add_edge(&mut self, caller: NodeId, callee: NodeId) {
        self.nodes[caller].callees.insert(callee);
        self.nodes[callee].callers.insert(caller);
        let callee_size = self.nodes[callee].transitive_size;
        self.nodes[caller].transitive_size += callee_size;
    }

    pub fn finish(self) -> PrimaryMap<NodeId, CallGraphNode> {
        self.nodes
    }
}

/// Pick the node to assign next (spec.md §4.3 step 1): the largest
/// `transitive_size <= capacity` among `worklist`, or, if none fits,
/// the smallest `transitive_size` (the oversize-SCC case, which will
/// force its own bin expansion via the packer's step 3).
///
/// Iterates `worklist` in ascending [`NodeId`] order so ties resolve
/// deterministically; spec.md does not mandate a particular tie-break.
fn pick_node(nodes: &PrimaryMap<NodeId, CallGraphNode>, worklist: &HashSet<NodeId>, capacity: u32) -> NodeId {
    let mut ordered: Vec<NodeId> = worklist.iter().copied().collect();
    ordered.sort_by_key(|n| n.index());

    let mut best_fitting: Option<(NodeId, u32)> = None;
    let mut smallest: Option<(NodeId, u32)> = None;
    for id in ordered {
        let size = nodes[id].transitive_size;
        if smallest.map_or(true, |(_, s)| size < s) {
            smallest = Some((id, size));
        }
        if size <= capacity && best_fitting.map_or(true, |(_, s)| size > s) {
            best_fitting = Some((id, size));
        }
    }

    best_fitting.or(smallest).expect("worklist is non-empty").0
}

/// Run the call-graph packer's assignment loop (spec.md §4.3), merging
/// clusters into the first-fit packer one aggregated request at a time.
///
/// Takes `nodes` by exclusive reference because step 4 of the loop
/// mutates transitive sizes in place as nodes get packed.
///
/// Returns the function -> bin mapping for every pagerando function
/// that belongs to a node in `nodes`.
pub fn pack_call_graph(
    nodes: &mut PrimaryMap<NodeId, CallGraphNode>,
    packer: &mut FirstFitPacker,
) -> FxHashMap<FuncId, BinId> {
    let capacity = packer.capacity();
    let mut worklist: HashSet<NodeId> = nodes.keys().collect();
    let mut node_bins: FxHashMap<NodeId, BinId> = FxHashMap::default();

    while !worklist.is_empty() {
        let picked = pick_node(nodes, &worklist, capacity);
        let picked_size = nodes[picked].transitive_size;
        let bin = packer.assign(picked_size);

        // Step 3: assign `bin` to `picked` and every transitive callee
        // still in the worklist. A callee already assigned elsewhere is
        // a BFS boundary: it (and everything under it) was already
        // packed by an earlier iteration and is left alone.
        let mut callee_bfs = VecDeque::from([picked]);
        while let Some(n) = callee_bfs.pop_front() {
            if !worklist.remove(&n) {
                continue;
            }
            node_bins.insert(n, bin);
            for &callee in &nodes[n].callees {
                callee_bfs.push_back(callee);
            }
        }

        // Step 4: every transitive caller of `picked` no longer needs to
        // carry `picked`'s weight — it has already been packed.
        let mut caller_bfs: VecDeque<NodeId> = nodes[picked].callers.iter().copied().collect();
        let mut visited_callers: HashSet<NodeId> = HashSet::new();
        while let Some(n) = caller_bfs.pop_front() {
            if !visited_callers.insert(n) {
                continue;
            }
            nodes[n].transitive_size = nodes[n].transitive_size.saturating_sub(picked_size);
            for &caller in &nodes[n].callers {
                caller_bfs.push_back(caller);
            }
        }
    }

    let mut result = FxHashMap::default();
    for (id, node) in nodes.iter() {
        if let Some(&bin) = node_bins.get(&id) {
            for &func in &node.members {
                result.insert(func, bin);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Config;
    use cranelift_entity::EntityRef;

    fn func(n: u32) -> FuncId {
        FuncId::new(n as usize)
    }

    /// spec.md §8 concrete scenario 6: 8 nodes, sizes
    /// `[600, 800, 3500, 1000, 1000, 1000, 4000, 100]`, edges
    /// `0->1, 0->2, 1->3, 1->4, 1->5, 2->6, 2->7`, capacity 4096.
    /// Expected mapping for node ids 0..7 is `[4, 2, 3, 2, 2, 2, 1, 3]`.
    #[test]
    fn call_graph_clustering_scenario() {
        let mut builder = CallGraphBuilder::new();
        let sizes = [600u32, 800, 3500, 1000, 1000, 1000, 4000, 100];
        let ids: Vec<NodeId> = sizes
            .iter()
            .enumerate()
            .map(|(i, &s)| builder.add_node(vec![func(i as u32)], s))
            .collect();
        // Bottom-up: leaves first, so a callee's transitive size is
        // already final by the time an edge into it accumulates onto its
        // caller (`add_edge`'s precondition). `add_node` having already
        // created every node does not itself satisfy that — edges still
        // have to be added leaf-first, not in the scenario's listing
        // order (node 1 and node 2's outgoing edges before node 0's).
        builder.add_edge(ids[1], ids[3]);
        builder.add_edge(ids[1], ids[4]);
        builder.add_edge(ids[1], ids[5]);
        builder.add_edge(ids[2], ids[6]);
        builder.add_edge(ids[2], ids[7]);
        builder.add_edge(ids[0], ids[1]);
        builder.add_edge(ids[0], ids[2]);
        let mut nodes = builder.finish();

        let mut packer = FirstFitPacker::new(&Config::with_capacity(4096));
        let mapping = pack_call_graph(&mut nodes, &mut packer);

        let expected = [4u32, 2, 3, 2, 2, 2, 1, 3];
        for (i, &want) in expected.iter().enumerate() {
            let got = mapping.get(&func(i as u32)).expect("every function is mapped").as_u32();
            assert_eq!(got, want, "node {i} expected bin {want}, got {got}");
        }
    }

    /// spec.md §8 P8: a node's bin is identical to every transitive
    /// callee's bin, as computed at pack time.
    #[test]
    fn clustering_monotonicity() {
        let mut builder = CallGraphBuilder::new();
        let ids: Vec<NodeId> = [500u32, 500, 500]
            .iter()
            .enumerate()
            .map(|(i, &s)| builder.add_node(vec![func(i as u32)], s))
            .collect();
        builder.add_edge(ids[0], ids[1]);
        builder.add_edge(ids[1], ids[2]);
        let mut nodes = builder.finish();

        let mut packer = FirstFitPacker::new(&Config::with_capacity(4096));
        let mapping = pack_call_graph(&mut nodes, &mut packer);

        let bin0 = mapping[&func(0)];
        let bin1 = mapping[&func(1)];
        let bin2 = mapping[&func(2)];
        assert_eq!(bin0, bin1);
        assert_eq!(bin1, bin2);
    }

    #[test]
    fn graph_with_no_nodes_is_a_no_op() {
        let mut nodes: PrimaryMap<NodeId, CallGraphNode> = PrimaryMap::new();
        let mut packer = FirstFitPacker::new(&Config::with_capacity(4096));
        let mapping = pack_call_graph(&mut nodes, &mut packer);
        assert!(mapping.is_empty());
    }
}
