use super::ReadWriteSet;
use cadence_ir::{Instr, Machine};
use cadence_utils::Id;
use linked_hash_map::LinkedHashMap;

/// Live ranges of the variables of a machine's `step`.
///
/// The step is linearized in pre-order: the instruction at position `p`
/// reads at point `2p` and writes at point `2p + 1`; an `If` reads its
/// condition at its own position and its branches follow it. Assertions read
/// after the last instruction. The range of a variable spans from its first
/// to its last access, which is conservative across branches.
///
/// Two variables whose ranges are disjoint can share storage: the slot of a
/// variable last read by an instruction can be written by the same
/// instruction.
#[derive(Default, Debug)]
pub struct LiveRanges {
    ranges: LinkedHashMap<Id, (usize, usize)>,
}

impl LiveRanges {
    pub fn new(machine: &Machine) -> Self {
        let mut lr = LiveRanges::default();
        let mut pos = 0;
        lr.walk(&machine.step, &mut pos);
        let end = 2 * pos;
        for assert in &machine.asserts {
            for v in assert.locs().into_iter().filter_map(|l| match l {
                cadence_ir::Loc::Var(v) => Some(v),
                cadence_ir::Loc::State(_) => None,
            }) {
                lr.touch(v, end);
            }
        }
        lr
    }

    fn touch(&mut self, v: Id, point: usize) {
        let range = self.ranges.entry(v).or_insert((point, point));
        range.0 = range.0.min(point);
        range.1 = range.1.max(point);
    }

    fn walk(&mut self, block: &[Instr], pos: &mut usize) {
        for instr in block {
            let p = *pos;
            *pos += 1;
            match instr {
                Instr::If { cond, then, els } => {
                    for l in cond.locs() {
                        if let cadence_ir::Loc::Var(v) = l {
                            self.touch(v, 2 * p);
                        }
                    }
                    self.walk(then, pos);
                    self.walk(els, pos);
                }
                _ => {
                    for v in ReadWriteSet::var_reads(instr) {
                        self.touch(v, 2 * p);
                    }
                    for v in ReadWriteSet::var_writes(instr) {
                        self.touch(v, 2 * p + 1);
                    }
                }
            }
        }
    }

    /// Range of `v`, or `None` if it is never accessed.
    pub fn range(&self, v: Id) -> Option<(usize, usize)> {
        self.ranges.get(&v).copied()
    }

    /// True if the live ranges of `a` and `b` intersect. Variables that are
    /// never accessed overlap with nothing.
    pub fn overlap(&self, a: Id, b: Id) -> bool {
        match (self.range(a), self.range(b)) {
            (Some((s1, e1)), Some((s2, e2))) => s1 <= e2 && s2 <= e1,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ir::{BinOp, MExpr, Type, VarDecl};

    fn machine(step: Vec<Instr>) -> Machine {
        Machine {
            name: "m".into(),
            inputs: vec![VarDecl::new("x", Type::Int)],
            outputs: vec![VarDecl::new("y", Type::Int)],
            locals: vec![
                VarDecl::new("t1", Type::Int),
                VarDecl::new("t2", Type::Int),
            ],
            memories: vec![],
            instances: vec![],
            step,
            reset: vec![],
            asserts: vec![],
        }
    }

    #[test]
    fn last_read_and_write_in_one_instruction_do_not_overlap() {
        let m = machine(vec![
            Instr::assign("t1", MExpr::var("x")),
            Instr::assign(
                "t2",
                MExpr::binop(BinOp::Add, MExpr::var("t1"), MExpr::int(1)),
            ),
            Instr::assign("y", MExpr::var("t2")),
        ]);
        let lr = LiveRanges::new(&m);
        assert_eq!(lr.range("t1".into()), Some((1, 2)));
        assert_eq!(lr.range("t2".into()), Some((3, 4)));
        assert!(!lr.overlap("t1".into(), "t2".into()));
    }

    #[test]
    fn assertions_extend_ranges() {
        let mut m = machine(vec![
            Instr::assign("t1", MExpr::var("x")),
            Instr::assign("t2", MExpr::var("x")),
            Instr::assign("y", MExpr::var("t2")),
        ]);
        m.asserts.push(MExpr::var("t1"));
        let lr = LiveRanges::new(&m);
        assert!(lr.overlap("t1".into(), "t2".into()));
    }
}
