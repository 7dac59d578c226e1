use cadence_frontend::{Equation, Node};
use cadence_utils::Id;
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use std::collections::{HashMap, HashSet};

/// Kinds of dependencies between the variables of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// `u -> v`: the definition of `v` reads `u` in the same step.
    Data,
    /// `d -> m`: the definition of `d` reads the previous value of memory
    /// `m`, so it must run before `m` is updated.
    Memory,
}

/// Per-node graph of "must be computed before" relations between variables.
///
/// Vertices are all variables of the node in declaration order. Besides the
/// variable graph, the builder records the same relations between equations
/// (by index) so that equations defining no variable are still ordered.
///
/// ## Example
/// ```text
/// y = x + c;      -- Data x -> y, Memory y -> c
/// c = 0 fby y;    -- Data y -> c
/// ```
pub struct DependencyGraph {
    graph: DiGraph<Id, EdgeKind>,
    index: HashMap<Id, NodeIndex>,
    /// Equation defining each variable.
    def_eq: HashMap<Id, usize>,
    /// Dependencies between equations `(before, after, kind)`.
    eq_edges: Vec<(usize, usize, EdgeKind)>,
    num_equations: usize,
}

impl DependencyGraph {
    /// Build the graph of `node`. Never fails: undefined names are ignored
    /// and cycles are reported by the scheduler.
    pub fn build(node: &Node) -> Self {
        let mut graph = DiGraph::new();
        let index: HashMap<Id, NodeIndex> = node
            .vars()
            .map(|(v, _)| (v.name, graph.add_node(v.name)))
            .collect();

        let mut def_eq = HashMap::new();
        for (i, eq) in node.equations.iter().enumerate() {
            for d in eq.defs() {
                def_eq.insert(d, i);
            }
        }

        let mut seen: HashSet<(NodeIndex, NodeIndex, EdgeKind)> =
            HashSet::new();
        let mut add_edge =
            |graph: &mut DiGraph<Id, EdgeKind>, a: Id, b: Id, kind| {
                if let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b))
                {
                    if seen.insert((ia, ib, kind)) {
                        graph.add_edge(ia, ib, kind);
                    }
                }
            };

        let mut eq_edges = HashSet::new();
        for (i, eq) in node.equations.iter().enumerate() {
            let defs = eq.defs();
            for r in Self::same_step_reads(node, eq) {
                if node.is_memory(r) {
                    for &d in defs.iter().filter(|d| **d != r) {
                        add_edge(&mut graph, d, r, EdgeKind::Memory);
                    }
                    if let Some(&f) = def_eq.get(&r) {
                        if f != i {
                            eq_edges.insert((i, f, EdgeKind::Memory));
                        }
                    }
                } else {
                    for &d in &defs {
                        add_edge(&mut graph, r, d, EdgeKind::Data);
                    }
                    if let Some(&w) = def_eq.get(&r) {
                        eq_edges.insert((w, i, EdgeKind::Data));
                    }
                }
            }
        }

        let mut eq_edges: Vec<_> = eq_edges.into_iter().collect();
        eq_edges.sort_by_key(|(a, b, k)| (*a, *b, *k == EdgeKind::Memory));
        DependencyGraph {
            graph,
            index,
            def_eq,
            eq_edges,
            num_equations: node.equations.len(),
        }
    }

    /// Names an equation reads when it runs: its right-hand side, its
    /// activation clock and the clocks of the variables it defines.
    fn same_step_reads(node: &Node, eq: &Equation) -> Vec<Id> {
        let mut reads = eq.reads();
        for d in eq.defs() {
            if let Some((decl, _)) = node.find_var(d) {
                reads.extend(decl.clock.vars());
            }
        }
        reads
    }

    /// Variables in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = Id> + '_ {
        self.graph.node_weights().copied()
    }

    /// Position of `var` in declaration order.
    pub fn position(&self, var: Id) -> Option<usize> {
        self.index.get(&var).map(|i| i.index())
    }

    pub fn defining_equation(&self, var: Id) -> Option<usize> {
        self.def_eq.get(&var).copied()
    }

    fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = (Id, Id)> + '_ {
        self.graph
            .edge_references()
            .filter(move |e| *e.weight() == kind)
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
    }

    pub fn data_edges(&self) -> impl Iterator<Item = (Id, Id)> + '_ {
        self.edges_of(EdgeKind::Data)
    }

    pub fn memory_edges(&self) -> impl Iterator<Item = (Id, Id)> + '_ {
        self.edges_of(EdgeKind::Memory)
    }

    /// Direct predecessors of `var`.
    pub fn preds(&self, var: Id) -> Vec<(Id, EdgeKind)> {
        let Some(&idx) = self.index.get(&var) else {
            return vec![];
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (self.graph[e.source()], *e.weight()))
            .collect()
    }

    /// The subgraph of same-step dependencies.
    pub fn data_graph(&self) -> DiGraph<Id, ()> {
        self.graph.filter_map(
            |_, v| Some(*v),
            |_, k| (*k == EdgeKind::Data).then_some(()),
        )
    }

    /// Dependencies between equations, sorted.
    pub fn equation_edges(&self) -> &[(usize, usize, EdgeKind)] {
        &self.eq_edges
    }

    pub fn num_equations(&self) -> usize {
        self.num_equations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_frontend::{BinOp, Clock, Const, Expr, Type, VarDecl};

    fn id(s: &str) -> Id {
        Id::from(s)
    }

    #[test]
    fn memory_reads_are_not_data_edges() {
        let mut n = Node::new("acc");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.memories.push(VarDecl::new("c", Type::Int));
        n.equations.push(Equation::def(
            "y",
            Expr::binop(BinOp::Add, Expr::var("x"), Expr::var("c")),
        ));
        n.equations.push(Equation::fby(
            "c",
            Some(Const::Int(0)),
            Expr::binop(BinOp::Add, Expr::var("y"), Expr::var("c")),
        ));
        let g = DependencyGraph::build(&n);

        let mut data: Vec<_> = g.data_edges().collect();
        data.sort();
        assert_eq!(data, vec![(id("x"), id("y")), (id("y"), id("c"))]);
        // `c` reading itself is not a dependency.
        assert_eq!(
            g.memory_edges().collect::<Vec<_>>(),
            vec![(id("y"), id("c"))]
        );
        assert_eq!(
            g.equation_edges(),
            &[(0, 1, EdgeKind::Data), (0, 1, EdgeKind::Memory)]
        );
    }

    #[test]
    fn clocks_and_calls_contribute_edges() {
        let mut n = Node::new("f");
        n.inputs.push(VarDecl::new("c", Type::Bool));
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.outputs.push(VarDecl::new("z", Type::Int));
        n.locals.push(
            VarDecl::new("w", Type::Int)
                .with_clock(Clock::on(Clock::Base, id("c"), true)),
        );
        n.equations
            .push(Equation::def("w", Expr::when(Expr::var("x"), "c", true)));
        n.equations.push(Equation::call(
            vec![id("y"), id("z")],
            "g",
            vec![Expr::var("x")],
        ));
        let g = DependencyGraph::build(&n);
        let preds_w: HashSet<_> = g.preds(id("w")).into_iter().collect();
        assert_eq!(
            preds_w,
            HashSet::from([
                (id("x"), EdgeKind::Data),
                (id("c"), EdgeKind::Data)
            ])
        );
        assert_eq!(g.preds(id("y")), vec![(id("x"), EdgeKind::Data)]);
        assert_eq!(g.preds(id("z")), vec![(id("x"), EdgeKind::Data)]);
    }
}
