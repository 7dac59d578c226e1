//! Causal scheduling of the equations of a node.
use crate::analysis::{DependencyGraph, EdgeKind};
use cadence_ir::{Schedule, Snapshot};
use cadence_frontend::{Equation, Node, Role};
use cadence_utils::{CadenceResult, Error, Id, NameGenerator, Warning};
use linked_hash_map::LinkedHashMap;
use petgraph::algo::kosaraju_scc;
use std::collections::{BTreeSet, HashSet};

/// Computes a sequential order for the equations of a node.
///
/// Equations are ordered by a topological sort of the equation dependencies.
/// When several equations are ready, the one declared first runs first, so
/// the schedule is a function of declaration order alone.
///
/// Memory dependencies (a memory must be read before it is updated) can form
/// cycles on their own, as in `a = 0 fby b; b = 1 fby a`. These are broken
/// by a snapshot `a_pre = a` scheduled before the update of `a`, with the
/// remaining readers of `a` reading `a_pre` instead.
pub struct Scheduler;

/// Equation dependencies during the sort. Snapshot equations are appended
/// after the node's equations.
struct EqGraph {
    succs: Vec<Vec<(usize, EdgeKind)>>,
    indeg: Vec<usize>,
    scheduled: Vec<bool>,
}

impl EqGraph {
    fn new(n: usize, edges: &[(usize, usize, EdgeKind)]) -> Self {
        let mut g = EqGraph {
            succs: vec![vec![]; n],
            indeg: vec![0; n],
            scheduled: vec![false; n],
        };
        for &(a, b, kind) in edges {
            g.add_edge(a, b, kind);
        }
        g
    }

    fn add_eq(&mut self) -> usize {
        self.succs.push(vec![]);
        self.indeg.push(0);
        self.scheduled.push(false);
        self.succs.len() - 1
    }

    fn add_edge(&mut self, a: usize, b: usize, kind: EdgeKind) {
        self.succs[a].push((b, kind));
        self.indeg[b] += 1;
    }

    /// True if an unscheduled equation among the first `limit` must read a
    /// memory before `target` updates it.
    fn has_memory_preds(&self, target: usize, limit: usize) -> bool {
        (0..limit).any(|src| {
            !self.scheduled[src]
                && self.succs[src]
                    .iter()
                    .any(|&(t, k)| t == target && k == EdgeKind::Memory)
        })
    }

    /// Remove the memory edges from the unscheduled equations among the first
    /// `limit` into `target` and return their sources.
    fn detach_memory_preds(
        &mut self,
        target: usize,
        limit: usize,
    ) -> Vec<usize> {
        let mut readers = vec![];
        for src in 0..limit {
            if self.scheduled[src] {
                continue;
            }
            let before = self.succs[src].len();
            self.succs[src]
                .retain(|&(t, k)| !(t == target && k == EdgeKind::Memory));
            let removed = before - self.succs[src].len();
            if removed > 0 {
                self.indeg[target] -= removed;
                readers.push(src);
            }
        }
        readers
    }
}

impl Scheduler {
    pub fn schedule(
        node: &Node,
        graph: &DependencyGraph,
        namegen: &mut NameGenerator,
    ) -> CadenceResult<Schedule> {
        Self::check_causality(node, graph)?;

        let n = graph.num_equations();
        let mut eqs = EqGraph::new(n, graph.equation_edges());
        let mut ready: BTreeSet<usize> =
            (0..n).filter(|&i| eqs.indeg[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut snapshots: Vec<Snapshot> = vec![];

        while order.len() < eqs.succs.len() {
            let Some(cur) = ready.pop_first() else {
                let snap =
                    Self::break_memory_cycle(node, graph, &mut eqs, namegen)?;
                log::debug!(
                    "{}: `{}' snapshots `{}' for {} reader(s)",
                    node.name,
                    snap.local,
                    snap.memory,
                    snap.readers.len()
                );
                ready.extend(
                    (0..eqs.succs.len())
                        .filter(|&i| !eqs.scheduled[i] && eqs.indeg[i] == 0),
                );
                snapshots.push(snap);
                continue;
            };
            eqs.scheduled[cur] = true;
            order.push(cur);
            for (succ, _) in std::mem::take(&mut eqs.succs[cur]) {
                eqs.indeg[succ] -= 1;
                if eqs.indeg[succ] == 0 {
                    ready.insert(succ);
                }
            }
        }

        let mut schedule = Schedule {
            order,
            snapshots,
            ..Default::default()
        };
        Self::compute_fan_in(node, &mut schedule);
        Ok(schedule)
    }

    /// Report the same-step cycle containing the earliest declared variable.
    fn check_causality(
        node: &Node,
        graph: &DependencyGraph,
    ) -> CadenceResult<()> {
        let data = graph.data_graph();
        let cycle = kosaraju_scc(&data)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || data.contains_edge(scc[0], scc[0])
            })
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .min_by_key(|scc| scc[0]);

        match cycle {
            None => Ok(()),
            Some(scc) => Err(Error::CausalityCycle {
                node: node.name,
                vars: scc.into_iter().map(|idx| data[idx]).collect(),
            }),
        }
    }

    /// Called when no equation is ready. Snapshots the memory of the first
    /// blocked update that still has readers of the node waiting on it.
    /// Every call detaches at least one of the node's memory edges, so the
    /// sort terminates.
    fn break_memory_cycle(
        node: &Node,
        graph: &DependencyGraph,
        eqs: &mut EqGraph,
        namegen: &mut NameGenerator,
    ) -> CadenceResult<Snapshot> {
        let n = node.equations.len();
        let (f, memory) = node
            .equations
            .iter()
            .enumerate()
            .filter(|(i, _)| !eqs.scheduled[*i])
            .find_map(|(i, eq)| match eq {
                Equation::Fby { lhs, .. } if eqs.has_memory_preds(i, n) => {
                    Some((i, *lhs))
                }
                _ => None,
            })
            .ok_or_else(|| {
                Error::misc(format!(
                    "Scheduling of `{}' is blocked by a dependency cycle",
                    node.name
                ))
            })?;

        let readers = eqs.detach_memory_preds(f, n);
        let local = namegen.gen_name(format!("{memory}_pre"));
        let snap = eqs.add_eq();
        eqs.add_edge(snap, f, EdgeKind::Memory);
        for &r in &readers {
            eqs.add_edge(snap, r, EdgeKind::Data);
        }
        // The snapshot runs on the clock of the memory. A clock held in a
        // memory is read before that memory is updated.
        let clock_vars = node
            .find_var(memory)
            .map(|(decl, _)| decl.clock.vars())
            .unwrap_or_default();
        for v in clock_vars {
            let Some(w) = graph.defining_equation(v) else {
                continue;
            };
            if eqs.scheduled[w] {
                continue;
            }
            if node.is_memory(v) {
                eqs.add_edge(snap, w, EdgeKind::Memory);
            } else {
                eqs.add_edge(w, snap, EdgeKind::Data);
            }
        }

        Ok(Snapshot {
            local,
            memory,
            readers,
        })
    }

    /// Names an equation reads, including the clocks of what it defines.
    fn reads_of(node: &Node, eq: &Equation) -> HashSet<Id> {
        let mut reads: HashSet<Id> = eq.reads().into_iter().collect();
        for d in eq.defs() {
            if let Some((decl, _)) = node.find_var(d) {
                reads.extend(decl.clock.vars());
            }
        }
        reads
    }

    fn compute_fan_in(node: &Node, schedule: &mut Schedule) {
        let mut node = node.clone();
        schedule.add_snapshots(&mut node);
        let node = &node;

        let mut fan_in: LinkedHashMap<Id, usize> =
            node.vars().map(|(v, _)| (v.name, 0)).collect();

        for eq in &node.equations {
            let defs = eq.defs();
            for r in Self::reads_of(node, eq) {
                if defs.contains(&r) {
                    continue;
                }
                if let Some(count) = fan_in.get_mut(&r) {
                    *count += 1;
                }
            }
        }
        for assert in &node.asserts {
            let mut reads = vec![];
            assert.reads(&mut reads);
            let reads: HashSet<Id> = reads.into_iter().collect();
            for r in reads {
                if let Some(count) = fan_in.get_mut(&r) {
                    *count += 1;
                }
            }
        }

        schedule.unused = fan_in
            .iter()
            .filter(|(v, count)| {
                **count == 0 && node.role(**v) != Some(Role::Output)
            })
            .map(|(v, _)| *v)
            .collect();
        schedule.fan_in = fan_in;
    }

    /// Warnings for the inputs and memories nothing reads.
    pub fn warnings(node: &Node, schedule: &Schedule) -> Vec<Warning> {
        schedule
            .unused
            .iter()
            .filter_map(|&var| match node.role(var) {
                Some(Role::Input) => Some(Warning::UnusedInput {
                    node: node.name,
                    var,
                }),
                Some(Role::Memory) => Some(Warning::UnusedMemory {
                    node: node.name,
                    var,
                }),
                _ => None,
            })
            .collect()
    }
}
