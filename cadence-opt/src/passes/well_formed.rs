use crate::traversal::{
    Action, ConstructVisitor, DiagnosticContext, DiagnosticPass, Named,
    VisResult, Visitor,
};
use cadence_ir::{Callee, Context, Instr, Loc, MExpr, Machine};
use cadence_utils::{CadenceResult, Error, Id};
use std::collections::{HashMap, HashSet};

/// Checks that machine code only refers to storage its machine declares.
///
/// Reports, for every machine:
/// - variables declared twice,
/// - instances of nodes that are neither compiled nor imported, or whose
///   calls do not match the node's interface,
/// - writes to undeclared variables or to inputs,
/// - state updates of undeclared memory cells,
/// - reads of undeclared variables or memory cells.
pub struct WellFormed {
    /// Declared variables, mapped to true for inputs.
    vars: HashMap<Id, bool>,
    memories: HashSet<Id>,
    /// Declared instances with the number of inputs and outputs of their node.
    instances: HashMap<Id, Option<(usize, usize)>>,
    machine: Id,
    diag: DiagnosticContext,
}

impl Named for WellFormed {
    fn name() -> &'static str {
        "well-formed"
    }

    fn description() -> &'static str {
        "check that machines only use the storage they declare"
    }
}

impl ConstructVisitor for WellFormed {
    fn from(_ctx: &Context) -> CadenceResult<Self>
    where
        Self: Sized,
    {
        Ok(WellFormed {
            vars: HashMap::new(),
            memories: HashSet::new(),
            instances: HashMap::new(),
            machine: Id::from(""),
            diag: DiagnosticContext::default(),
        })
    }

    fn clear_data(&mut self) {
        self.vars.clear();
        self.memories.clear();
        self.instances.clear();
    }
}

impl DiagnosticPass for WellFormed {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl WellFormed {
    fn error<S: ToString>(&mut self, msg: S) {
        let msg = format!("machine `{}': {}", self.machine, msg.to_string());
        self.diag.err(Error::malformed(msg));
    }

    fn check_write(&mut self, dst: Id) {
        match self.vars.get(&dst) {
            None => self.error(format!("write to undeclared variable `{dst}'")),
            Some(true) => self.error(format!("write to input `{dst}'")),
            Some(false) => (),
        }
    }

    fn check_reads(&mut self, expr: &MExpr) {
        for loc in expr.locs() {
            match loc {
                Loc::Var(v) if !self.vars.contains_key(&v) => {
                    self.error(format!("read of undeclared variable `{v}'"))
                }
                Loc::State(s) if !self.memories.contains(&s) => {
                    self.error(format!("read of undeclared memory `{s}'"))
                }
                _ => (),
            }
        }
    }

    fn check_instance(&mut self, inst: Id) -> Option<(usize, usize)> {
        match self.instances.get(&inst) {
            Some(arity) => *arity,
            None => {
                self.error(format!("use of undeclared instance `{inst}'"));
                None
            }
        }
    }
}

impl Visitor for WellFormed {
    fn start(
        &mut self,
        m: &mut Machine,
        ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        self.machine = m.name;
        let decls = m
            .inputs
            .iter()
            .map(|v| (v.name, true))
            .chain(m.outputs.iter().chain(&m.locals).map(|v| (v.name, false)));
        for (name, is_input) in decls {
            if self.vars.insert(name, is_input).is_some() {
                self.error(format!("variable `{name}' is declared twice"));
            }
        }
        self.memories = m.memories.iter().map(|c| c.name).collect();

        for inst in &m.instances {
            let known = match &inst.callee {
                Callee::Local(_) => {
                    inst.node != m.name
                        && ctx.machine_index.contains_key(&inst.node)
                }
                Callee::Imported { .. } => ctx.imports.contains_key(&inst.node),
            };
            if !known {
                self.error(format!(
                    "instance `{}' of unknown node `{}'",
                    inst.name, inst.node
                ));
            }
            let arity = ctx
                .signature(inst.node)
                .map(|sig| (sig.inputs.len(), sig.outputs.len()));
            self.instances.insert(inst.name, arity);
        }
        Ok(Action::Continue)
    }

    fn start_instr(&mut self, instr: &mut Instr, _ctx: &Context) -> VisResult {
        match instr {
            Instr::Assign { dst, src } => {
                self.check_reads(src);
                self.check_write(*dst);
            }
            Instr::StateAssign { dst, src } => {
                self.check_reads(src);
                if !self.memories.contains(dst) {
                    self.error(format!("update of undeclared memory `{dst}'"));
                }
            }
            Instr::If { cond, .. } => self.check_reads(cond),
            Instr::Call {
                outs,
                instance,
                args,
            } => {
                args.iter().for_each(|a| self.check_reads(a));
                outs.iter().for_each(|o| self.check_write(*o));
                if let Some((ins, outputs)) = self.check_instance(*instance) {
                    if ins != args.len() || outputs != outs.len() {
                        self.error(format!(
                            "call of `{instance}' with {} argument(s) and \
                             {} result(s), expected {ins} and {outputs}",
                            args.len(),
                            outs.len()
                        ));
                    }
                }
            }
            Instr::Reset { instance } => {
                self.check_instance(*instance);
            }
        }
        Ok(Action::Continue)
    }

    fn finish(
        &mut self,
        m: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        for assert in &m.asserts {
            self.check_reads(assert);
        }
        Ok(Action::Continue)
    }
}
