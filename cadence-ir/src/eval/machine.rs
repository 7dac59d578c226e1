//! Executes machines: `reset` once, then `step` with a trace of inputs.
use super::{ops, Value};
use crate::{Callee, Context, Instr, MExpr, Machine, MachineIdx};
use cadence_frontend::Const;
use cadence_utils::{CadenceResult, Error, Id};
use std::collections::HashMap;

/// Memory cells of a machine and the nested state of its instances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MachineState {
    pub mems: HashMap<Id, Const>,
    pub instances: HashMap<Id, MachineState>,
}

impl MachineState {
    fn build(ctx: &Context, idx: MachineIdx) -> CadenceResult<Self> {
        let machine = ctx.machine(idx);
        let mut instances = HashMap::new();
        for inst in &machine.instances {
            match &inst.callee {
                Callee::Local(sub) => {
                    instances.insert(inst.name, Self::build(ctx, *sub)?);
                }
                Callee::Imported { module } => {
                    return Err(Error::eval(format!(
                        "instance `{}' of `{}' runs node `{}' from module \
                         `{module}' which cannot be simulated",
                        inst.name, machine.name, inst.node
                    )))
                }
            }
        }
        Ok(MachineState {
            mems: HashMap::new(),
            instances,
        })
    }
}

/// Simulates the machine compiled for a node.
pub struct Simulator<'a> {
    ctx: &'a Context,
    root: MachineIdx,
    state: MachineState,
}

impl<'a> Simulator<'a> {
    pub fn new(ctx: &'a Context, node: Id) -> CadenceResult<Self> {
        let root = *ctx
            .machine_index
            .get(&node)
            .ok_or_else(|| Error::undefined(node, "machine"))?;
        Ok(Simulator {
            ctx,
            root,
            state: MachineState::build(ctx, root)?,
        })
    }

    pub fn reset(&mut self) -> CadenceResult<()> {
        Exec::new(self.ctx, self.root).run_reset(&mut self.state)
    }

    /// Run one step. `inputs` are given in declaration order; `None` marks an
    /// input absent at this instant. Returns the outputs in declaration order.
    pub fn step(&mut self, inputs: &[Value]) -> CadenceResult<Vec<Value>> {
        Exec::new(self.ctx, self.root).run_step(&mut self.state, inputs)
    }

    /// Run `reset` followed by one step per element of `trace`.
    pub fn run(
        &mut self,
        trace: &[Vec<Value>],
    ) -> CadenceResult<Vec<Vec<Value>>> {
        self.reset()?;
        trace.iter().map(|inputs| self.step(inputs)).collect()
    }

    /// Current value of a memory cell of the root machine.
    pub fn memory(&self, name: Id) -> Option<&Const> {
        self.state.mems.get(&name)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }
}

/// Execution of one machine for the duration of one `step` or `reset`.
struct Exec<'a> {
    ctx: &'a Context,
    machine: &'a Machine,
    vars: HashMap<Id, Const>,
}

impl<'a> Exec<'a> {
    fn new(ctx: &'a Context, idx: MachineIdx) -> Self {
        Exec {
            ctx,
            machine: ctx.machine(idx),
            vars: HashMap::new(),
        }
    }

    fn run_reset(&mut self, state: &mut MachineState) -> CadenceResult<()> {
        let machine = self.machine;
        self.exec_block(&machine.reset, state)
    }

    fn run_step(
        &mut self,
        state: &mut MachineState,
        inputs: &[Value],
    ) -> CadenceResult<Vec<Value>> {
        let machine = self.machine;
        if inputs.len() != machine.inputs.len() {
            return Err(Error::eval(format!(
                "`{}' expects {} input(s), got {}",
                machine.name,
                machine.inputs.len(),
                inputs.len()
            )));
        }
        self.vars.clear();
        for (decl, value) in machine.inputs.iter().zip(inputs) {
            if let Some(v) = value {
                self.vars.insert(decl.name, v.clone());
            }
        }
        self.exec_block(&machine.step, state)?;

        for assert in &machine.asserts {
            if let Ok(Const::Bool(false)) = self.eval(assert, state) {
                log::warn!("Assertion failed in `{}'", machine.name);
            }
        }
        Ok(machine
            .outputs
            .iter()
            .map(|o| self.vars.get(&o.name).cloned())
            .collect())
    }

    fn callee(&self, instance: Id) -> CadenceResult<MachineIdx> {
        match self.machine.find_instance(instance).map(|i| &i.callee) {
            Some(Callee::Local(idx)) => Ok(*idx),
            Some(Callee::Imported { module }) => Err(Error::eval(format!(
                "instance `{instance}' belongs to module `{module}'"
            ))),
            None => Err(Error::undefined(instance, "instance")),
        }
    }

    fn exec_block(
        &mut self,
        block: &[Instr],
        state: &mut MachineState,
    ) -> CadenceResult<()> {
        block.iter().try_for_each(|i| self.exec(i, state))
    }

    fn exec(
        &mut self,
        instr: &Instr,
        state: &mut MachineState,
    ) -> CadenceResult<()> {
        match instr {
            Instr::Assign { dst, src } => {
                let v = self.eval(src, state)?;
                self.vars.insert(*dst, v);
            }
            Instr::StateAssign { dst, src } => {
                let v = self.eval(src, state)?;
                state.mems.insert(*dst, v);
            }
            Instr::If { cond, then, els } => {
                match self.eval(cond, state)? {
                    Const::Bool(true) => self.exec_block(then, state)?,
                    Const::Bool(false) => self.exec_block(els, state)?,
                    c => {
                        return Err(Error::eval(format!(
                            "condition evaluated to non-boolean {c}"
                        )))
                    }
                }
            }
            Instr::Call {
                outs,
                instance,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, state).map(Some))
                    .collect::<CadenceResult<Vec<_>>>()?;
                let idx = self.callee(*instance)?;
                let sub = state
                    .instances
                    .get_mut(instance)
                    .ok_or_else(|| Error::undefined(*instance, "instance"))?;
                let results = Exec::new(self.ctx, idx).run_step(sub, &args)?;
                for (o, r) in outs.iter().zip(results) {
                    match r {
                        Some(v) => self.vars.insert(*o, v),
                        None => self.vars.remove(o),
                    };
                }
            }
            Instr::Reset { instance } => {
                let idx = self.callee(*instance)?;
                let sub = state
                    .instances
                    .get_mut(instance)
                    .ok_or_else(|| Error::undefined(*instance, "instance"))?;
                Exec::new(self.ctx, idx).run_reset(sub)?;
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &MExpr, state: &MachineState) -> CadenceResult<Const> {
        match expr {
            MExpr::Var(v) => self.vars.get(v).cloned().ok_or_else(|| {
                Error::eval(format!(
                    "`{v}' read while absent in `{}'",
                    self.machine.name
                ))
            }),
            MExpr::State(s) => state.mems.get(s).cloned().ok_or_else(|| {
                Error::eval(format!(
                    "memory `{s}' of `{}' read before reset",
                    self.machine.name
                ))
            }),
            MExpr::Const(c) => Ok(c.clone()),
            MExpr::Global(g) => self
                .ctx
                .const_value(*g)
                .cloned()
                .ok_or_else(|| Error::undefined(*g, "constant")),
            MExpr::Unop { op, arg } => {
                ops::eval_unop(*op, &self.eval(arg, state)?)
            }
            MExpr::Binop { op, lhs, rhs } => ops::eval_binop(
                *op,
                &self.eval(lhs, state)?,
                &self.eval(rhs, state)?,
            ),
        }
    }
}
