//! Passes for the Cadence compiler.
mod cse;
mod fusion;
mod reuse_slots;
mod schedule_nodes;
mod translate_nodes;
mod unfold_constants;
mod well_formed;

pub use cse::Cse;
pub use fusion::Fusion;
pub use reuse_slots::ReuseSlots;
pub use schedule_nodes::ScheduleNodes;
pub use translate_nodes::TranslateNodes;
pub use unfold_constants::UnfoldConstants;
pub use well_formed::WellFormed;

use cadence_ir::{Instr, Loc, MExpr};

/// Locations read by `instr` itself, without its nested blocks.
pub(crate) fn own_reads(instr: &Instr) -> Vec<Loc> {
    match instr {
        Instr::If { cond, .. } => cond.locs(),
        _ => instr.read_locs(),
    }
}

/// Drop `If`s whose branches are both empty.
pub(crate) fn drop_empty_ifs(block: &mut Vec<Instr>) {
    for instr in block.iter_mut() {
        if let Instr::If { then, els, .. } = instr {
            drop_empty_ifs(then);
            drop_empty_ifs(els);
        }
    }
    block.retain(|i| {
        !matches!(
            i,
            Instr::If { then, els, .. } if then.is_empty() && els.is_empty()
        )
    });
}

/// Replace each maximal subexpression of `expr` for which `f` returns a
/// replacement. Returns true if something was replaced.
pub(crate) fn replace_top_down<F>(expr: &mut MExpr, f: &mut F) -> bool
where
    F: FnMut(&MExpr) -> Option<MExpr>,
{
    if let Some(new) = f(expr) {
        *expr = new;
        return true;
    }
    match expr {
        MExpr::Unop { arg, .. } => replace_top_down(arg, f),
        MExpr::Binop { lhs, rhs, .. } => {
            let l = replace_top_down(lhs, f);
            let r = replace_top_down(rhs, f);
            l || r
        }
        _ => false,
    }
}
