use crate::analysis::{GraphColoring, LiveRanges};
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use cadence_ir::{Context, Machine, Rewriter, Type};
use cadence_utils::{CadenceResult, Error, Id, OutputFile};
use itertools::Itertools;
use std::io::Write;

/// Lets locals of the same type whose live ranges are disjoint share one
/// storage slot.
///
/// Each slot keeps the name of the first local assigned to it; the other
/// locals are renamed and their declarations removed. Inputs, outputs and
/// memory cells are never shared.
pub struct ReuseSlots {
    /// Where to write the conflict graphs in the dot format.
    dump_graph: Option<OutputFile>,
}

impl Named for ReuseSlots {
    fn name() -> &'static str {
        "reuse-slots"
    }

    fn description() -> &'static str {
        "share storage between locals with disjoint live ranges"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "dump-graph",
            "write the conflict graph of each machine to the given stream",
            ParseVal::OutStream(OutputFile::Null),
            PassOpt::parse_outstream,
        )]
    }
}

impl ConstructVisitor for ReuseSlots {
    fn from(ctx: &Context) -> CadenceResult<Self>
    where
        Self: Sized,
    {
        let opts = Self::get_opts(ctx);
        Ok(ReuseSlots {
            dump_graph: opts["dump-graph"].not_null_outstream(),
        })
    }

    fn clear_data(&mut self) {
        /* all data can be transferred between machines */
    }
}

impl ReuseSlots {
    /// Mapping from every local to the local whose slot it uses.
    fn slots(&self, m: &Machine) -> CadenceResult<Vec<(Id, Id)>> {
        let live = LiveRanges::new(m);
        let mut groups: Vec<(&Type, Vec<Id>)> = vec![];
        for l in &m.locals {
            match groups.iter_mut().find(|(ty, _)| **ty == l.ty) {
                Some((_, vars)) => vars.push(l.name),
                None => groups.push((&l.ty, vec![l.name])),
            }
        }

        let mut slots = vec![];
        for (ty, vars) in groups {
            let mut graph: GraphColoring<Id> = GraphColoring::default();
            for v in &vars {
                graph.add_node(*v);
            }
            for (a, b) in vars.iter().tuple_combinations() {
                if live.overlap(*a, *b) {
                    graph.insert_conflict(*a, *b);
                }
            }
            if let Some(out) = &self.dump_graph {
                let mut w = out.get_write()?;
                writeln!(w, "// {} : {ty}\n{}", m.name, graph.to_dot())
                    .map_err(|e| Error::io("cannot write conflict graph", e))?;
            }
            let coloring = graph.color_greedy_with(vars.iter().copied());
            slots.extend(vars.iter().map(|v| (*v, coloring[v])));
        }
        Ok(slots)
    }
}

impl Visitor for ReuseSlots {
    fn start(
        &mut self,
        m: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        let rw = Rewriter {
            var_map: self
                .slots(m)?
                .into_iter()
                .filter(|(v, slot)| v != slot)
                .collect(),
            ..Default::default()
        };
        if !rw.is_empty() {
            log::debug!(
                "{}: {} local(s) moved to a shared slot",
                m.name,
                rw.var_map.len()
            );
        }
        rw.rewrite_machine(m);
        m.locals.retain(|l| !rw.var_map.contains_key(&l.name));
        Ok(Action::SkipChildren)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::*;
    use cadence_ir::{BinOp, Instr, MExpr, VarDecl};

    fn machine() -> Machine {
        Machine {
            name: "m".into(),
            inputs: vec![VarDecl::new("x", Type::Int)],
            outputs: vec![VarDecl::new("y", Type::Int)],
            locals: vec![
                VarDecl::new("t1", Type::Int),
                VarDecl::new("b", Type::Bool),
                VarDecl::new("t2", Type::Int),
                VarDecl::new("t3", Type::Int),
            ],
            memories: vec![],
            instances: vec![],
            step: vec![
                Instr::assign("t1", MExpr::var("x")),
                Instr::assign(
                    "t2",
                    MExpr::binop(BinOp::Add, MExpr::var("t1"), MExpr::int(1)),
                ),
                Instr::assign(
                    "b",
                    MExpr::binop(BinOp::Lt, MExpr::var("t2"), MExpr::int(0)),
                ),
                Instr::assign(
                    "t3",
                    MExpr::binop(
                        BinOp::Add,
                        MExpr::var("t2"),
                        MExpr::var("t1"),
                    ),
                ),
                Instr::If {
                    cond: MExpr::var("b"),
                    then: vec![Instr::assign("y", MExpr::var("t3"))],
                    els: vec![Instr::assign("y", MExpr::var("x"))],
                },
            ],
            reset: vec![],
            asserts: vec![],
        }
    }

    fn reuse(m: &mut Machine) {
        let mut pass = ReuseSlots { dump_graph: None };
        let ctx = context(vec![]);
        pass.start(m, &ctx, &[]).unwrap();
    }

    #[test]
    fn disjoint_locals_share_a_slot() {
        let mut m = machine();
        reuse(&mut m);
        let locals: Vec<Id> = m.locals.iter().map(|l| l.name).collect();
        assert_eq!(locals, vec![Id::from("t1"), Id::from("b"), Id::from("t2")]);
        // t3 is written after the last reads of t1 and t2.
        assert_eq!(
            m.step[3],
            Instr::assign(
                "t1",
                MExpr::binop(BinOp::Add, MExpr::var("t2"), MExpr::var("t1")),
            )
        );
        assert_eq!(
            m.step[4],
            Instr::If {
                cond: MExpr::var("b"),
                then: vec![Instr::assign("y", MExpr::var("t1"))],
                els: vec![Instr::assign("y", MExpr::var("x"))],
            }
        );
    }

    #[test]
    fn shared_slots_never_hold_two_live_values() {
        let mut ctx = compile(sample_nodes());
        let before = ctx.machines.clone();
        ReuseSlots::do_pass_default(&mut ctx).unwrap();
        for (old, new) in before.iter().zip(&ctx.machines) {
            let live = LiveRanges::new(old);
            let slots = ReuseSlots { dump_graph: None }.slots(old).unwrap();
            for ((a, sa), (b, sb)) in slots.iter().tuple_combinations() {
                if sa == sb {
                    assert!(
                        !live.overlap(*a, *b),
                        "{a} and {b} in {}",
                        old.name
                    );
                }
            }
            for (v, slot) in &slots {
                assert!(old.is_local(*v) && new.is_local(*slot));
            }
        }
        assert_samples_equivalent(&ctx);
        let once = ctx.machines.clone();
        ReuseSlots::do_pass_default(&mut ctx).unwrap();
        assert_eq!(ctx.machines, once);
    }
}
