use itertools::Itertools;
use petgraph::{
    graph::{NodeIndex, UnGraph},
    Graph,
};
use std::{collections::HashMap, hash::Hash};

/// Interference graph with greedy coloring. Colors are the nodes themselves:
/// each node is mapped to the first node of its color class.
pub struct GraphColoring<T: Eq + Hash> {
    graph: UnGraph<T, ()>,
    index_map: HashMap<T, NodeIndex>,
}

impl<T: Eq + Hash> Default for GraphColoring<T> {
    fn default() -> Self {
        GraphColoring {
            graph: Graph::new_undirected(),
            index_map: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone + std::fmt::Debug> GraphColoring<T> {
    pub fn add_node(&mut self, a: T) -> NodeIndex {
        if let Some(idx) = self.index_map.get(&a) {
            return *idx;
        }
        let idx = self.graph.add_node(a.clone());
        self.index_map.insert(a, idx);
        idx
    }

    pub fn insert_conflict(&mut self, a: T, b: T) {
        let a_node = self.add_node(a.clone());
        // No self edges, but the node is still recorded.
        if a == b {
            return;
        }
        let b_node = self.add_node(b);
        self.graph.update_edge(a_node, b_node, ());
    }

    pub fn has_conflict(&self, a: &T, b: &T) -> bool {
        match (self.index_map.get(a), self.index_map.get(b)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    /// Given an `ordering` of `T`s, find a mapping from nodes to `T`s such
    /// that no node has a neighbor with the same `T`. Nodes are colored in
    /// the given order with the first color not used by a neighbor.
    pub fn color_greedy_with(
        &self,
        ordering: impl Iterator<Item = T>,
    ) -> HashMap<T, T> {
        let mut colors: Vec<T> = Vec::new();
        let mut coloring: HashMap<T, T> = HashMap::new();

        for node in ordering {
            let Some(&idx) = self.index_map.get(&node) else {
                coloring.insert(node.clone(), node);
                continue;
            };
            let used: Vec<&T> = self
                .graph
                .neighbors(idx)
                .filter_map(|nbr| coloring.get(&self.graph[nbr]))
                .collect();
            let color = colors
                .iter()
                .find(|c| !used.contains(c))
                .cloned()
                .unwrap_or_else(|| {
                    colors.push(node.clone());
                    node.clone()
                });
            coloring.insert(node, color);
        }
        coloring
    }
}

impl<T: Eq + Hash + ToString> GraphColoring<T> {
    /// Render the graph in the dot format.
    pub fn to_dot(&self) -> String {
        let nodes = self
            .graph
            .node_weights()
            .map(|n| format!("  {0} [label=\"{0}\"];", n.to_string()))
            .join("\n");
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_endpoints(idx))
            .unique()
            .map(|(a, b)| {
                format!(
                    "  {} -- {};",
                    self.graph[a].to_string(),
                    self.graph[b].to_string()
                )
            })
            .join("\n");
        format!("graph {{\n{nodes}\n{edges}\n}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_get_distinct_colors() {
        let mut g = GraphColoring::default();
        g.insert_conflict("a", "b");
        g.insert_conflict("b", "c");
        g.add_node("d");
        let coloring = g.color_greedy_with(["a", "b", "c", "d"].into_iter());
        assert_eq!(coloring["a"], "a");
        assert_eq!(coloring["b"], "b");
        assert_eq!(coloring["c"], "a");
        assert_eq!(coloring["d"], "a");
        assert!(g.to_dot().contains("a -- b"));
    }
}
