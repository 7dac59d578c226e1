use cadence_frontend::Equation;
use cadence_ir::{Context, Machine};
use cadence_utils::{CadenceResult, Error, Id};
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Traversal of the machine arena.
///
/// Each machine is taken out of the arena while it is updated, so that the
/// update can read every other machine. The machines come back in arena
/// order (and every [cadence_ir::MachineIdx] stays valid) once the traversal
/// is done.
pub struct MachineTraversal {
    machines: Vec<Machine>,
}

impl MachineTraversal {
    pub fn new(machines: Vec<Machine>) -> Self {
        Self { machines }
    }

    /// Applies `upd` to every machine in arena order. The update sees the
    /// other machines, without the current one.
    pub fn apply_update<F>(&mut self, mut upd: F) -> CadenceResult<()>
    where
        F: FnMut(&mut Machine, &Vec<Machine>) -> CadenceResult<()>,
    {
        for idx in 0..self.machines.len() {
            let mut machine = self.machines.remove(idx);
            let res = upd(&mut machine, &self.machines);
            self.machines.insert(idx, machine);
            res?;
        }
        Ok(())
    }

    /// Returns the underlying machine vector in original order.
    pub fn take(self) -> Vec<Machine> {
        self.machines
    }
}

/// Names of the nodes of `ctx` ordered so that callees come before their
/// callers. Calls to imported nodes are ignored; mutual recursion between
/// nodes is an error.
pub fn node_post_order(ctx: &Context) -> CadenceResult<Vec<Id>> {
    let mut graph: DiGraph<Id, ()> = DiGraph::new();
    let index: HashMap<Id, NodeIndex> = ctx
        .nodes
        .keys()
        .map(|name| (*name, graph.add_node(*name)))
        .collect();
    for node in ctx.nodes.values() {
        for eq in &node.equations {
            if let Equation::Call { node: callee, .. } = eq {
                if let Some(&c) = index.get(callee) {
                    graph.update_edge(c, index[&node.name], ());
                }
            }
        }
    }
    let order = algo::toposort(&graph, None).map_err(|cycle| {
        Error::malformed(format!(
            "node `{}' is recursive",
            graph[cycle.node_id()]
        ))
    })?;
    Ok(order.into_iter().map(|idx| graph[idx]).collect())
}
