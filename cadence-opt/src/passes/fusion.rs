use super::{drop_empty_ifs, own_reads};
use crate::analysis::ReadWriteSet;
use crate::traversal::{Action, Named, VisResult, Visitor};
use cadence_ir::{Context, Instr, Loc, Machine, Rewriter};
use cadence_utils::Id;
use std::collections::{HashMap, HashSet};

/// Merges adjacent conditionals on the same condition and forwards
/// single-use temporaries into their reader.
///
/// Two `If`s can be merged when the first one does not write a location its
/// condition reads. A local that is written once and read once is replaced by
/// its definition when the reader is a later instruction of the same block
/// and no location read by the definition is written in between.
///
/// # Example
/// ```text
/// if k { t := x + 1; }           if k {
/// if k { y := t; } else { ... }    y := (x + 1);
///                             =>  } else { ... }
/// ```
#[derive(Default)]
pub struct Fusion {
    merged: usize,
    forwarded: usize,
}

impl Named for Fusion {
    fn name() -> &'static str {
        "fusion"
    }

    fn description() -> &'static str {
        "merge conditionals on the same clock and forward single-use \
         temporaries"
    }
}

/// Read and write counts of the variables of a machine.
struct Uses {
    reads: HashMap<Id, usize>,
    writes: HashMap<Id, usize>,
    locals: HashSet<Id>,
}

impl Uses {
    fn new(m: &Machine) -> Self {
        let mut reads: HashMap<Id, usize> = HashMap::new();
        let locs = m
            .step
            .iter()
            .chain(&m.reset)
            .flat_map(Instr::read_locs)
            .chain(m.asserts.iter().flat_map(|a| a.locs()));
        for l in locs {
            if let Loc::Var(v) = l {
                *reads.entry(v).or_default() += 1;
            }
        }
        Uses {
            reads,
            writes: ReadWriteSet::write_counts(&m.step),
            locals: m.locals.iter().map(|l| l.name).collect(),
        }
    }

    fn single_use(&self, v: &Id) -> bool {
        self.locals.contains(v)
            && self.writes.get(v) == Some(&1)
            && self.reads.get(v) == Some(&1)
    }
}

fn mergeable(first: &Instr, second: &Instr) -> bool {
    match (first, second) {
        (
            Instr::If { cond, then, els },
            Instr::If { cond: cond2, .. },
        ) => {
            let body = then.iter().chain(els);
            cond == cond2 && !ReadWriteSet::writes_any(body, &cond.locs())
        }
        _ => false,
    }
}

/// A definition at index `i` that can be forwarded into the instruction at
/// index `j`.
fn find_forward(block: &[Instr], uses: &Uses) -> Option<(usize, usize)> {
    block.iter().enumerate().find_map(|(i, instr)| {
        let Instr::Assign { dst, src } = instr else {
            return None;
        };
        if !uses.single_use(dst) {
            return None;
        }
        let j = block[i + 1..]
            .iter()
            .position(|c| own_reads(c).contains(&Loc::Var(*dst)))?
            + i
            + 1;
        (!ReadWriteSet::writes_any(&block[i + 1..j], &src.locs()))
            .then_some((i, j))
    })
}

impl Fusion {
    fn merge_ifs(&mut self, block: &mut Vec<Instr>) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i + 1 < block.len() {
            if !mergeable(&block[i], &block[i + 1]) {
                i += 1;
                continue;
            }
            let second = block.remove(i + 1);
            if let (
                Instr::If { then, els, .. },
                Instr::If {
                    then: then2,
                    els: els2,
                    ..
                },
            ) = (&mut block[i], second)
            {
                then.extend(then2);
                els.extend(els2);
            }
            self.merged += 1;
            changed = true;
        }
        changed
    }

    fn fuse_block(
        &mut self,
        block: &mut Vec<Instr>,
        uses: &Uses,
        removed: &mut Vec<Id>,
    ) -> bool {
        let mut changed = self.merge_ifs(block);
        while let Some((i, j)) = find_forward(block, uses) {
            if let Instr::Assign { dst, src } = block.remove(i) {
                let mut rw = Rewriter::default();
                rw.expr_map.insert(dst, src);
                rw.rewrite_instr(&mut block[j - 1]);
                removed.push(dst);
            }
            self.forwarded += 1;
            changed = true;
        }
        for instr in block.iter_mut() {
            if let Instr::If { then, els, .. } = instr {
                changed |= self.fuse_block(then, uses, removed);
                changed |= self.fuse_block(els, uses, removed);
            }
        }
        changed
    }
}

impl Visitor for Fusion {
    fn start(
        &mut self,
        m: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        loop {
            let uses = Uses::new(m);
            let mut removed = vec![];
            if !self.fuse_block(&mut m.step, &uses, &mut removed) {
                break;
            }
            m.locals.retain(|l| !removed.contains(&l.name));
        }
        drop_empty_ifs(&mut m.step);
        log::debug!(
            "{}: merged {} conditional(s), forwarded {} temporar(ies)",
            m.name,
            self.merged,
            self.forwarded
        );
        Ok(Action::SkipChildren)
    }
}
