use cadence_frontend::{Equation, Expr, Node, VarDecl};
use cadence_utils::Id;
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;

/// A local introduced to hold the value a memory had at the start of the
/// step, so that readers scheduled after the memory update still observe the
/// previous value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub local: Id,
    pub memory: Id,
    /// Equations (by index) whose reads of `memory` go through `local`.
    pub readers: Vec<usize>,
}

/// Execution order of a node's equations.
///
/// Indices in `order` refer to the node's equations followed by one
/// `local = memory` equation per snapshot, in the order of `snapshots`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    pub order: Vec<usize>,
    pub snapshots: Vec<Snapshot>,
    /// Number of equations, other than the defining one, and assertions
    /// reading each variable.
    pub fan_in: LinkedHashMap<Id, usize>,
    /// Variables with no reader that are not outputs.
    pub unused: Vec<Id>,
}

impl Schedule {
    /// The equation defining snapshot `snap`.
    pub fn snapshot_equation(snap: &Snapshot) -> Equation {
        Equation::def(snap.local, Expr::Var(snap.memory))
    }

    /// Rewrite `node` so that its equations appear in scheduled order, with
    /// snapshot locals declared and their readers redirected.
    pub fn apply(&self, node: &mut Node) {
        self.add_snapshots(node);
        let equations = std::mem::take(&mut node.equations);
        node.equations =
            self.order.iter().map(|&i| equations[i].clone()).collect();
    }

    /// Redirect the readers of every snapshotted memory to the snapshot, in
    /// their right-hand sides and in the clocks of what they define. Declares
    /// the snapshot locals and appends their equations, in the order of
    /// `snapshots`.
    pub fn add_snapshots(&self, node: &mut Node) {
        for snap in &self.snapshots {
            let rename = HashMap::from([(snap.memory, snap.local)]);
            for &r in &snap.readers {
                let eq = &mut node.equations[r];
                eq.rename_reads(snap.memory, snap.local);
                for d in eq.defs() {
                    let decl = node
                        .outputs
                        .iter_mut()
                        .chain(&mut node.locals)
                        .chain(&mut node.memories)
                        .find(|v| v.name == d);
                    if let Some(decl) = decl {
                        decl.clock = decl.clock.renamed(&rename);
                    }
                }
            }
            let decl = node
                .memories
                .iter()
                .find(|m| m.name == snap.memory)
                .map(|m| VarDecl {
                    name: snap.local,
                    ty: m.ty.clone(),
                    clock: m.clock.clone(),
                });
            node.locals.extend(decl);
            node.equations.push(Self::snapshot_equation(snap));
        }
    }

    /// True if `var` is read by nothing and is not an output.
    pub fn is_unused(&self, var: Id) -> bool {
        self.unused.contains(&var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_frontend::{Clock, Const, Type};

    #[test]
    fn apply_inserts_snapshot_and_reorders() {
        // m1 = 0 fby m2; m2 = 1 fby m1
        let mut n = Node::new("swap");
        n.outputs.push(VarDecl::new("o", Type::Int));
        n.memories.push(VarDecl::new("m1", Type::Int));
        n.memories.push(VarDecl::new("m2", Type::Int));
        n.equations = vec![
            Equation::fby("m1", Some(Const::Int(0)), Expr::var("m2")),
            Equation::fby("m2", Some(Const::Int(1)), Expr::var("m1")),
            Equation::def("o", Expr::var("m1")),
        ];
        let sched = Schedule {
            order: vec![3, 2, 0, 1],
            snapshots: vec![Snapshot {
                local: "m1_pre".into(),
                memory: "m1".into(),
                readers: vec![1],
            }],
            ..Default::default()
        };
        sched.apply(&mut n);
        assert_eq!(n.locals[0].name, "m1_pre");
        assert_eq!(n.equations[0], Equation::def("m1_pre", Expr::var("m1")));
        assert_eq!(
            n.equations[3],
            Equation::fby("m2", Some(Const::Int(1)), Expr::var("m1_pre"))
        );
        assert!(n.check_definitions().is_ok());
    }

    #[test]
    fn snapshot_readers_sample_on_the_snapshot() {
        // b = false fby b2; b2 = true fby b; y = x when b
        let on_b = Clock::on(Clock::Base, "b".into(), true);
        let mut n = Node::new("sampled");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.locals.push(VarDecl::new("y", Type::Int).with_clock(on_b.clone()));
        n.memories.push(VarDecl::new("b", Type::Bool));
        n.memories.push(VarDecl::new("b2", Type::Bool));
        n.equations = vec![
            Equation::fby("b", Some(Const::Bool(false)), Expr::var("b2")),
            Equation::fby("b2", Some(Const::Bool(true)), Expr::var("b")),
            Equation::def("y", Expr::when(Expr::var("x"), "b", true)),
        ];
        let sched = Schedule {
            order: vec![3, 0, 1, 2],
            snapshots: vec![Snapshot {
                local: "b_pre".into(),
                memory: "b".into(),
                readers: vec![1, 2],
            }],
            ..Default::default()
        };
        sched.apply(&mut n);
        let y = n.locals.iter().find(|l| l.name == "y").unwrap();
        assert_eq!(y.clock, Clock::on(Clock::Base, "b_pre".into(), true));
        assert_eq!(
            n.equations[3],
            Equation::def("y", Expr::when(Expr::var("x"), "b_pre", true))
        );
        // The update of `b` and the snapshot itself still use `b`.
        assert_eq!(n.equations[0], Equation::def("b_pre", Expr::var("b")));
        assert_eq!(
            n.equations[1],
            Equation::fby("b", Some(Const::Bool(false)), Expr::var("b2"))
        );
    }
}
