use super::replace_top_down;
use crate::analysis::ReadWriteSet;
use crate::traversal::{Action, Named, VisResult, Visitor};
use cadence_ir::{Context, Instr, Loc, MExpr, Machine};
use cadence_utils::Id;

/// Common subexpression elimination over the blocks of a machine.
///
/// Walking a block in order, the right-hand side of every assignment becomes
/// available under its destination. A later subexpression structurally
/// equal to an available one reads the destination instead. A write to a
/// location kills the expressions reading it; branches start from the
/// expressions available before the `If` and their own expressions do not
/// survive it.
#[derive(Default)]
pub struct Cse {
    /// Number of subexpressions replaced.
    replaced: usize,
}

impl Named for Cse {
    fn name() -> &'static str {
        "cse"
    }

    fn description() -> &'static str {
        "reuse the value of repeated subexpressions"
    }
}

/// Expressions available in a block, with the variable holding them.
#[derive(Clone, Default)]
struct Available(Vec<(MExpr, Id)>);

impl Available {
    fn lookup(&self, e: &MExpr) -> Option<MExpr> {
        if e.is_leaf() {
            return None;
        }
        self.0
            .iter()
            .find(|(avail, _)| avail == e)
            .map(|(_, v)| MExpr::Var(*v))
    }

    fn kill(&mut self, loc: Loc) {
        self.0
            .retain(|(e, v)| Loc::Var(*v) != loc && !e.reads_loc(loc));
    }

    fn replace(&self, e: &mut MExpr) -> usize {
        usize::from(replace_top_down(e, &mut |sub| self.lookup(sub)))
    }
}

impl Cse {
    fn block(&mut self, block: &mut [Instr], avail: &mut Available) {
        for instr in block {
            match instr {
                Instr::Assign { dst, src } => {
                    self.replaced += avail.replace(src);
                    avail.kill(Loc::Var(*dst));
                    if !src.is_leaf() && !src.reads_loc(Loc::Var(*dst)) {
                        avail.0.push((src.clone(), *dst));
                    }
                }
                Instr::StateAssign { dst, src } => {
                    self.replaced += avail.replace(src);
                    avail.kill(Loc::State(*dst));
                }
                Instr::Call { args, .. } => {
                    for a in args.iter_mut() {
                        self.replaced += avail.replace(a);
                    }
                    for w in ReadWriteSet::var_writes(instr) {
                        avail.kill(Loc::Var(w));
                    }
                }
                Instr::If { cond, then, els } => {
                    self.replaced += avail.replace(cond);
                    self.block(then, &mut avail.clone());
                    self.block(els, &mut avail.clone());
                    let body = then.iter().chain(els.iter());
                    for w in ReadWriteSet::write_set(body) {
                        avail.kill(w);
                    }
                }
                Instr::Reset { .. } => (),
            }
        }
    }
}

impl Visitor for Cse {
    fn start(
        &mut self,
        m: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        self.block(&mut m.step, &mut Available::default());
        if self.replaced > 0 {
            log::debug!(
                "{}: {} subexpression(s) reused",
                m.name,
                self.replaced
            );
        }
        Ok(Action::SkipChildren)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::*;
    use cadence_ir::BinOp;

    fn add(l: MExpr, r: MExpr) -> MExpr {
        MExpr::binop(BinOp::Add, l, r)
    }

    #[test]
    fn repeated_expressions_read_the_first_destination() {
        let mut ctx = compile(vec![filter()]);
        Cse::do_pass_default(&mut ctx).unwrap();
        let m = ctx.find_machine("filter".into()).unwrap();
        assert!(
            m.step.contains(&Instr::assign("u", MExpr::var("t"))),
            "{}",
            cadence_ir::Printer::machine_to_str(m)
        );
    }

    #[test]
    fn writes_kill_availability() {
        let mut cse = Cse::default();
        let mut block = vec![
            Instr::assign("a", add(MExpr::var("x"), MExpr::state("m"))),
            Instr::StateAssign {
                dst: "m".into(),
                src: MExpr::var("a"),
            },
            Instr::assign("b", add(MExpr::var("x"), MExpr::state("m"))),
            Instr::If {
                cond: MExpr::var("k"),
                then: vec![Instr::assign("x", MExpr::int(0))],
                els: vec![Instr::assign(
                    "c",
                    add(MExpr::var("x"), MExpr::state("m")),
                )],
            },
            Instr::assign("d", add(MExpr::var("x"), MExpr::state("m"))),
        ];
        cse.block(&mut block, &mut Available::default());
        // Killed by the update of `m`.
        assert_eq!(
            block[2],
            Instr::assign("b", add(MExpr::var("x"), MExpr::state("m")))
        );
        // Inherited by the branch.
        let Instr::If { els, .. } = &block[3] else {
            panic!("expected a conditional")
        };
        assert_eq!(els[0], Instr::assign("c", MExpr::var("b")));
        // Killed by the write in the other branch.
        assert_eq!(
            block[4],
            Instr::assign("d", add(MExpr::var("x"), MExpr::state("m")))
        );
        assert_eq!(cse.replaced, 1);
    }

    #[test]
    fn preserves_behavior_and_is_idempotent() {
        let mut ctx = compile(sample_nodes());
        Cse::do_pass_default(&mut ctx).unwrap();
        assert_samples_equivalent(&ctx);
        let once = ctx.machines.clone();
        Cse::do_pass_default(&mut ctx).unwrap();
        assert_eq!(ctx.machines, once);
    }
}
