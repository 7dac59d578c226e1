use crate::{Instr, MExpr, Machine};
use cadence_utils::Id;
use std::collections::HashMap;

/// A rewrite map from [Id] to [T].
pub type RewriteMap<T> = HashMap<Id, T>;

/// Renames variables and substitutes expressions for variable reads in
/// machine code. Renamings apply to both reads and writes; substitutions only
/// to reads. State cells are never touched.
#[derive(Default)]
pub struct Rewriter {
    /// Mapping from variable names to their new names.
    pub var_map: RewriteMap<Id>,
    /// Mapping from variable names to the expression replacing their reads.
    pub expr_map: RewriteMap<MExpr>,
}

impl Rewriter {
    pub fn is_empty(&self) -> bool {
        self.var_map.is_empty() && self.expr_map.is_empty()
    }

    fn rename(&self, v: &mut Id) {
        if let Some(new) = self.var_map.get(v) {
            *v = *new;
        }
    }

    pub fn rewrite_expr(&self, expr: &mut MExpr) {
        match expr {
            MExpr::Var(v) => {
                if let Some(new) = self.expr_map.get(v) {
                    *expr = new.clone();
                } else {
                    self.rename(v);
                }
            }
            MExpr::State(_) | MExpr::Const(_) | MExpr::Global(_) => (),
            MExpr::Unop { arg, .. } => self.rewrite_expr(arg),
            MExpr::Binop { lhs, rhs, .. } => {
                self.rewrite_expr(lhs);
                self.rewrite_expr(rhs);
            }
        }
    }

    pub fn rewrite_instr(&self, instr: &mut Instr) {
        match instr {
            Instr::Assign { dst, src } => {
                self.rename(dst);
                self.rewrite_expr(src);
            }
            Instr::StateAssign { src, .. } => self.rewrite_expr(src),
            Instr::If { cond, then, els } => {
                self.rewrite_expr(cond);
                self.rewrite_block(then);
                self.rewrite_block(els);
            }
            Instr::Call { outs, args, .. } => {
                outs.iter_mut().for_each(|o| self.rename(o));
                args.iter_mut().for_each(|a| self.rewrite_expr(a));
            }
            Instr::Reset { .. } => (),
        }
    }

    pub fn rewrite_block(&self, block: &mut [Instr]) {
        block.iter_mut().for_each(|i| self.rewrite_instr(i))
    }

    /// Rewrite the step and reset sequences and the assertions of a machine.
    pub fn rewrite_machine(&self, machine: &mut Machine) {
        if self.is_empty() {
            return;
        }
        self.rewrite_block(&mut machine.step);
        self.rewrite_block(&mut machine.reset);
        machine
            .asserts
            .iter_mut()
            .for_each(|a| self.rewrite_expr(a));
    }
}
