//! Machines: the compiled form of a node.
//!
//! A machine is an explicit transition system. Its memory cells persist across
//! steps, its `step` sequence computes outputs from inputs and the current
//! state, and its `reset` sequence puts the state back to its initial value.
//! Sub-node instances are named slots whose state is nested in the owning
//! machine; they refer to the callee's machine by index in the context arena.
use cadence_frontend::{BinOp, Const, Type, UnOp, VarDecl};
use cadence_utils::{GetName, Id};
use serde::Serialize;

/// Index of a machine in the arena of a [crate::Context].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
pub struct MachineIdx(pub usize);

/// Machine backing an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    /// A machine compiled in this unit.
    Local(MachineIdx),
    /// A node of a separately compiled module, known only by its header.
    Imported { module: Id },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub name: Id,
    /// Name of the instantiated node.
    pub node: Id,
    pub callee: Callee,
}

impl GetName for Instance {
    fn name(&self) -> Id {
        self.name
    }
}

/// A memory cell and its value after reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemCell {
    pub name: Id,
    pub ty: Type,
    pub init: Const,
}

/// Pure expressions over machine storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MExpr {
    /// An input, output or local of the current step.
    Var(Id),
    /// A memory cell, holding the value written by the previous step.
    State(Id),
    Const(Const),
    /// A global constant.
    Global(Id),
    Unop {
        op: UnOp,
        arg: Box<MExpr>,
    },
    Binop {
        op: BinOp,
        lhs: Box<MExpr>,
        rhs: Box<MExpr>,
    },
}

/// A storage location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Loc {
    Var(Id),
    State(Id),
}

impl MExpr {
    pub fn var<S: Into<Id>>(name: S) -> Self {
        MExpr::Var(name.into())
    }

    pub fn state<S: Into<Id>>(name: S) -> Self {
        MExpr::State(name.into())
    }

    pub fn int(n: i64) -> Self {
        MExpr::Const(Const::Int(n))
    }

    pub fn binop(op: BinOp, lhs: MExpr, rhs: MExpr) -> Self {
        MExpr::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unop(op: UnOp, arg: MExpr) -> Self {
        MExpr::Unop {
            op,
            arg: Box::new(arg),
        }
    }

    /// Locations read by this expression.
    pub fn reads(&self, out: &mut Vec<Loc>) {
        match self {
            MExpr::Var(v) => out.push(Loc::Var(*v)),
            MExpr::State(s) => out.push(Loc::State(*s)),
            MExpr::Const(_) | MExpr::Global(_) => (),
            MExpr::Unop { arg, .. } => arg.reads(out),
            MExpr::Binop { lhs, rhs, .. } => {
                lhs.reads(out);
                rhs.reads(out);
            }
        }
    }

    pub fn locs(&self) -> Vec<Loc> {
        let mut out = vec![];
        self.reads(&mut out);
        out
    }

    /// True if the expression reads `loc`.
    pub fn reads_loc(&self, loc: Loc) -> bool {
        self.locs().contains(&loc)
    }

    /// Number of occurrences of `Var(v)`.
    pub fn count_var(&self, v: Id) -> usize {
        match self {
            MExpr::Var(x) => usize::from(*x == v),
            MExpr::State(_) | MExpr::Const(_) | MExpr::Global(_) => 0,
            MExpr::Unop { arg, .. } => arg.count_var(v),
            MExpr::Binop { lhs, rhs, .. } => {
                lhs.count_var(v) + rhs.count_var(v)
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            MExpr::Var(_) | MExpr::State(_) | MExpr::Const(_) | MExpr::Global(_)
        )
    }

    /// Apply `f` bottom-up to every subexpression.
    pub fn map_bottom_up<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut MExpr),
    {
        match self {
            MExpr::Unop { arg, .. } => arg.map_bottom_up(f),
            MExpr::Binop { lhs, rhs, .. } => {
                lhs.map_bottom_up(f);
                rhs.map_bottom_up(f);
            }
            _ => (),
        }
        f(self)
    }
}

/// Machine instructions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Instr {
    /// Write a variable of the current step.
    Assign { dst: Id, src: MExpr },
    /// Write the next value of a memory cell.
    StateAssign { dst: Id, src: MExpr },
    If {
        cond: MExpr,
        then: Vec<Instr>,
        els: Vec<Instr>,
    },
    /// Step an instance.
    Call {
        outs: Vec<Id>,
        instance: Id,
        args: Vec<MExpr>,
    },
    /// Reset an instance.
    Reset { instance: Id },
}

impl Instr {
    pub fn assign<S: Into<Id>>(dst: S, src: MExpr) -> Self {
        Instr::Assign {
            dst: dst.into(),
            src,
        }
    }

    /// Locations read by this instruction, including nested blocks.
    pub fn reads(&self, out: &mut Vec<Loc>) {
        match self {
            Instr::Assign { src, .. } | Instr::StateAssign { src, .. } => {
                src.reads(out)
            }
            Instr::If { cond, then, els } => {
                cond.reads(out);
                then.iter().chain(els).for_each(|i| i.reads(out));
            }
            Instr::Call { args, .. } => args.iter().for_each(|a| a.reads(out)),
            Instr::Reset { .. } => (),
        }
    }

    /// Locations written by this instruction, including nested blocks.
    pub fn writes(&self, out: &mut Vec<Loc>) {
        match self {
            Instr::Assign { dst, .. } => out.push(Loc::Var(*dst)),
            Instr::StateAssign { dst, .. } => out.push(Loc::State(*dst)),
            Instr::If { then, els, .. } => {
                then.iter().chain(els).for_each(|i| i.writes(out))
            }
            Instr::Call { outs, .. } => {
                out.extend(outs.iter().map(|o| Loc::Var(*o)))
            }
            Instr::Reset { .. } => (),
        }
    }

    pub fn read_locs(&self) -> Vec<Loc> {
        let mut out = vec![];
        self.reads(&mut out);
        out
    }

    pub fn write_locs(&self) -> Vec<Loc> {
        let mut out = vec![];
        self.writes(&mut out);
        out
    }

    /// Instances stepped or reset by this instruction.
    pub fn instances(&self, out: &mut Vec<Id>) {
        match self {
            Instr::Call { instance, .. } | Instr::Reset { instance } => {
                out.push(*instance)
            }
            Instr::If { then, els, .. } => {
                then.iter().chain(els).for_each(|i| i.instances(out))
            }
            Instr::Assign { .. } | Instr::StateAssign { .. } => (),
        }
    }

    /// Apply `f` to every expression read by this instruction.
    pub fn for_each_expr_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut MExpr),
    {
        match self {
            Instr::Assign { src, .. } | Instr::StateAssign { src, .. } => {
                f(src)
            }
            Instr::If { cond, then, els } => {
                f(cond);
                then.iter_mut()
                    .chain(els.iter_mut())
                    .for_each(|i| i.for_each_expr_mut(f));
            }
            Instr::Call { args, .. } => args.iter_mut().for_each(f),
            Instr::Reset { .. } => (),
        }
    }

    /// Number of instructions, counting the contents of nested blocks.
    pub fn size(&self) -> usize {
        match self {
            Instr::If { then, els, .. } => {
                1 + then.iter().chain(els).map(Instr::size).sum::<usize>()
            }
            _ => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Machine {
    pub name: Id,
    pub inputs: Vec<VarDecl>,
    pub outputs: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub memories: Vec<MemCell>,
    pub instances: Vec<Instance>,
    pub step: Vec<Instr>,
    pub reset: Vec<Instr>,
    pub asserts: Vec<MExpr>,
}

impl GetName for Machine {
    fn name(&self) -> Id {
        self.name
    }
}

impl Machine {
    pub fn find_instance(&self, name: Id) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn find_memory(&self, name: Id) -> Option<&MemCell> {
        self.memories.iter().find(|m| m.name == name)
    }

    /// Declaration of an input, output or local.
    pub fn find_var(&self, name: Id) -> Option<&VarDecl> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .chain(&self.locals)
            .find(|v| v.name == name)
    }

    pub fn is_local(&self, name: Id) -> bool {
        self.locals.iter().any(|v| v.name == name)
    }

    /// Total number of step instructions, counting nested blocks.
    pub fn step_size(&self) -> usize {
        self.step.iter().map(Instr::size).sum()
    }
}
