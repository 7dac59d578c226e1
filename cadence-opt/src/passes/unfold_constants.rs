use super::{drop_empty_ifs, own_reads};
use crate::analysis::ReadWriteSet;
use crate::traversal::{
    Action, ConstructVisitor, Named, ParseVal, PassOpt, VisResult, Visitor,
};
use cadence_ir::{Context, Instr, Loc, MExpr, Machine, Rewriter};
use cadence_utils::{CadenceResult, Error, Id};
use std::collections::{HashMap, HashSet};

/// Replaces reads of global constants with their values, and removes locals
/// that only hold a literal.
///
/// With the `copies` option, locals holding a copy of another variable or of
/// a memory cell are removed too, provided the copied location is not
/// written between the copy and the last read of the local.
///
/// # Example
/// ```text
/// one := 1;            y := (x + 1);
/// y := (x + one);  =>
/// ```
pub struct UnfoldConstants {
    copies: bool,
}

impl Named for UnfoldConstants {
    fn name() -> &'static str {
        "unfold-constants"
    }

    fn description() -> &'static str {
        "inline global constants and locals defined by literals"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "copies",
            "also inline locals defined as copies of other locations",
            ParseVal::Bool(false),
            PassOpt::parse_bool,
        )]
    }
}

impl ConstructVisitor for UnfoldConstants {
    fn from(ctx: &Context) -> CadenceResult<Self>
    where
        Self: Sized,
    {
        let opts = Self::get_opts(ctx);
        Ok(UnfoldConstants {
            copies: opts["copies"].bool(),
        })
    }

    fn clear_data(&mut self) {
        /* all data can be transferred between machines */
    }
}

/// Instructions of a block in pre-order, nested blocks included.
fn linearize<'a>(block: &'a [Instr], out: &mut Vec<&'a Instr>) {
    for instr in block {
        out.push(instr);
        if let Instr::If { then, els, .. } = instr {
            linearize(then, out);
            linearize(els, out);
        }
    }
}

/// Remove the assignments to `vars`.
fn remove_assigns(block: &mut Vec<Instr>, vars: &HashSet<Id>) {
    block.retain(
        |i| !matches!(i, Instr::Assign { dst, .. } if vars.contains(dst)),
    );
    for instr in block.iter_mut() {
        if let Instr::If { then, els, .. } = instr {
            remove_assigns(then, vars);
            remove_assigns(els, vars);
        }
    }
}

impl UnfoldConstants {
    fn inline_globals(m: &mut Machine, ctx: &Context) -> CadenceResult<()> {
        let mut res = Ok(());
        let mut unfold = |e: &mut MExpr| {
            if let MExpr::Global(g) = e {
                match ctx.const_value(*g) {
                    Some(c) => *e = MExpr::Const(c.clone()),
                    None => res = Err(Error::undefined(*g, "constant")),
                }
            }
        };
        for instr in m.step.iter_mut().chain(m.reset.iter_mut()) {
            instr.for_each_expr_mut(&mut |e| e.map_bottom_up(&mut unfold));
        }
        for assert in m.asserts.iter_mut() {
            assert.map_bottom_up(&mut unfold);
        }
        res
    }

    /// Substitutions that can be performed together.
    fn substitutions(&self, m: &Machine) -> HashMap<Id, MExpr> {
        let mut linear = vec![];
        linearize(&m.step, &mut linear);
        let writes = ReadWriteSet::write_counts(&m.step);
        let end = linear.len();

        let mut last_read: HashMap<Id, usize> = HashMap::new();
        for (pos, instr) in linear.iter().enumerate() {
            for l in own_reads(instr) {
                if let Loc::Var(v) = l {
                    last_read.insert(v, pos);
                }
            }
        }
        for assert in &m.asserts {
            for l in assert.locs() {
                if let Loc::Var(v) = l {
                    last_read.insert(v, end);
                }
            }
        }

        let mut literals = HashMap::new();
        let mut copies = HashMap::new();
        for (pos, instr) in linear.iter().enumerate() {
            let Instr::Assign { dst, src } = instr else {
                continue;
            };
            if !m.is_local(*dst) || writes.get(dst) != Some(&1) {
                continue;
            }
            match src {
                MExpr::Const(_) => {
                    literals.insert(*dst, src.clone());
                }
                MExpr::Var(y) if self.copies && y != dst => {
                    if writes.get(y).copied().unwrap_or(0) <= 1 {
                        copies.insert(*dst, src.clone());
                    }
                }
                MExpr::State(s) if self.copies => {
                    let last = last_read
                        .get(dst)
                        .copied()
                        .unwrap_or(pos)
                        .clamp(pos + 1, end);
                    let clobbered = linear[pos + 1..last].iter().any(|i| {
                        matches!(
                            i,
                            Instr::StateAssign { dst, .. } if dst == s
                        )
                    });
                    if !clobbered {
                        copies.insert(*dst, src.clone());
                    }
                }
                _ => (),
            }
        }

        // A copy of a location that is itself replaced waits for the next
        // round.
        copies.retain(|_, src| match src {
            MExpr::Var(y) => !literals.contains_key(y),
            _ => true,
        });
        let copied: HashSet<Id> = copies.keys().copied().collect();
        copies.retain(|_, src| match src {
            MExpr::Var(y) => !copied.contains(y),
            _ => true,
        });
        literals.extend(copies);
        literals
    }
}

impl Visitor for UnfoldConstants {
    fn start(
        &mut self,
        m: &mut Machine,
        ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        Self::inline_globals(m, ctx)?;
        loop {
            let subst = self.substitutions(m);
            if subst.is_empty() {
                break;
            }
            let removed: HashSet<Id> = subst.keys().copied().collect();
            log::debug!("{}: unfolding {} local(s)", m.name, removed.len());
            Rewriter {
                expr_map: subst,
                ..Default::default()
            }
            .rewrite_machine(m);
            remove_assigns(&mut m.step, &removed);
            drop_empty_ifs(&mut m.step);
            m.locals.retain(|l| !removed.contains(&l.name));
        }
        Ok(Action::SkipChildren)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::*;
    use cadence_ir::{BinOp, Type, VarDecl};

    fn unfold(ctx: &mut Context, copies: bool) {
        ctx.extra_opts = if copies {
            vec!["unfold-constants:copies".to_string()]
        } else {
            vec![]
        };
        UnfoldConstants::do_pass_default(ctx).unwrap();
    }

    #[test]
    fn literals_and_globals_are_inlined() {
        let mut ctx = compile(vec![filter()]);
        unfold(&mut ctx, false);
        let m = ctx.find_machine("filter".into()).unwrap();
        assert!(!m.locals.iter().any(|l| l.name == "one"));
        let text = cadence_ir::Printer::machine_to_str(m);
        assert!(text.contains("w := (x * 3);"), "{text}");
        assert!(text.contains("z := (x + 1);"), "{text}");
    }

    #[test]
    fn state_copies_respect_updates() {
        // prev := state(m) is read before the update of m.
        let mut ctx = compile(vec![gated()]);
        unfold(&mut ctx, true);
        let m = ctx.find_machine("gated".into()).unwrap();
        assert!(!m.is_local("prev".into()));

        // Here the copy is read after the update and must stay.
        let mut m = m.clone();
        m.locals.push(VarDecl::new("late", Type::Int));
        m.step = vec![
            Instr::assign("late", MExpr::state("m")),
            Instr::StateAssign {
                dst: "m".into(),
                src: MExpr::var("x"),
            },
            Instr::assign(
                "o",
                MExpr::binop(BinOp::Add, MExpr::var("late"), MExpr::int(1)),
            ),
        ];
        let pass = UnfoldConstants { copies: true };
        assert!(pass.substitutions(&m).is_empty());
    }

    #[test]
    fn preserves_behavior_and_is_idempotent() {
        for copies in [false, true] {
            let mut ctx = compile(sample_nodes());
            unfold(&mut ctx, copies);
            assert_samples_equivalent(&ctx);
            let once = ctx.machines.clone();
            unfold(&mut ctx, copies);
            assert_eq!(ctx.machines, once);
        }
    }
}
