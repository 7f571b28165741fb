//! Interference graph
//!
//! Undirected graph over stack slots. Node order is insertion order, which
//! keeps simplification deterministic across runs.

use std::collections::{HashMap, HashSet};

use crate::ir::InstId;

#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    nodes: Vec<InstId>,
    edges: HashMap<InstId, HashSet<InstId>>,
}

impl InterferenceGraph {
    pub fn new() -> InterferenceGraph {
        InterferenceGraph::default()
    }

    pub fn add_node(&mut self, node: InstId) {
        if !self.edges.contains_key(&node) {
            self.nodes.push(node);
            self.edges.insert(node, HashSet::new());
        }
    }

    pub fn add_edge(&mut self, a: InstId, b: InstId) {
        if a == b {
            return;
        }
        self.add_node(a);
        self.add_node(b);
        if let Some(set) = self.edges.get_mut(&a) {
            set.insert(b);
        }
        if let Some(set) = self.edges.get_mut(&b) {
            set.insert(a);
        }
    }

    pub fn contains(&self, node: InstId) -> bool {
        self.edges.contains_key(&node)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn degree(&self, node: InstId) -> usize {
        self.edges.get(&node).map_or(0, HashSet::len)
    }

    pub fn neighbors(&self, node: InstId) -> impl Iterator<Item = InstId> + '_ {
        self.edges.get(&node).into_iter().flatten().copied()
    }

    pub fn nodes(&self) -> &[InstId] {
        &self.nodes
    }

    pub fn remove_node(&mut self, node: InstId) {
        if self.edges.remove(&node).is_none() {
            return;
        }
        self.nodes.retain(|&n| n != node);
        for set in self.edges.values_mut() {
            set.remove(&node);
        }
    }

    /// First node (in insertion order) with degree below `limit`.
    pub fn first_below(&self, limit: usize) -> Option<InstId> {
        self.nodes.iter().copied().find(|&n| self.degree(n) < limit)
    }

    /// Node with the smallest degree, ties broken by insertion order.
    pub fn min_degree(&self) -> Option<InstId> {
        self.nodes.iter().copied().min_by_key(|&n| self.degree(n))
    }
}
