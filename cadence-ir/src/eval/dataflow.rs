//! Reference semantics of dataflow nodes.
//!
//! Evaluates the equations of a node instant by instant, without scheduling
//! and without translation: at each instant an equation is evaluated as soon
//! as every variable it reads in the current instant is known. Used to check
//! that compiled machines compute the same streams.
use super::{ops, Value};
use crate::Context;
use cadence_frontend::{CExpr, Clock, Const, Equation, Expr, Node};
use cadence_utils::{CadenceResult, Error, Id};
use std::collections::HashMap;

pub struct StreamEvaluator<'a> {
    ctx: &'a Context,
    node: &'a Node,
    mems: HashMap<Id, Const>,
    /// State of the node called by each call equation, by equation index.
    subs: HashMap<usize, StreamEvaluator<'a>>,
}

impl<'a> StreamEvaluator<'a> {
    pub fn new(ctx: &'a Context, node: Id) -> CadenceResult<Self> {
        Self::build(ctx, node, &mut vec![])
    }

    fn build(
        ctx: &'a Context,
        name: Id,
        stack: &mut Vec<Id>,
    ) -> CadenceResult<Self> {
        if stack.contains(&name) {
            return Err(Error::malformed(format!(
                "node `{name}' is recursive"
            )));
        }
        let node = ctx.node(name).map_err(|_| {
            Error::eval(format!("no definition to evaluate `{name}'"))
        })?;
        stack.push(name);
        let mut subs = HashMap::new();
        for (i, eq) in node.equations.iter().enumerate() {
            if let Equation::Call { node: callee, .. } = eq {
                subs.insert(i, Self::build(ctx, *callee, stack)?);
            }
        }
        stack.pop();
        Ok(StreamEvaluator {
            ctx,
            node,
            mems: HashMap::new(),
            subs,
        })
    }

    pub fn reset(&mut self) -> CadenceResult<()> {
        self.mems.clear();
        for eq in &self.node.equations {
            if let Equation::Fby { lhs, init, .. } = eq {
                let value = match init {
                    Some(c) => c.clone(),
                    None => {
                        let (decl, _) =
                            self.node.find_var(*lhs).ok_or_else(|| {
                                Error::undefined(*lhs, "memory")
                            })?;
                        self.ctx.type_default(&decl.ty)?
                    }
                };
                self.mems.insert(*lhs, value);
            }
        }
        self.subs.values_mut().try_for_each(|s| s.reset())
    }

    /// Run `reset` followed by one instant per element of `trace`.
    pub fn run(
        &mut self,
        trace: &[Vec<Value>],
    ) -> CadenceResult<Vec<Vec<Value>>> {
        self.reset()?;
        trace.iter().map(|inputs| self.step(inputs)).collect()
    }

    /// True if every variable `eq` reads in the current instant is known.
    fn ready(&self, eq: &Equation, env: &HashMap<Id, Value>) -> bool {
        let mut reads = eq.reads();
        for lhs in eq.defs() {
            if let Some((decl, _)) = self.node.find_var(lhs) {
                reads.extend(decl.clock.vars());
            }
        }
        reads.iter().all(|r| {
            self.node.is_memory(*r)
                || env.contains_key(r)
                || (self.node.find_var(*r).is_none()
                    && self.ctx.consts.contains_key(r))
        })
    }

    pub fn step(&mut self, inputs: &[Value]) -> CadenceResult<Vec<Value>> {
        let node = self.node;
        let mut env: HashMap<Id, Value> = node
            .inputs
            .iter()
            .zip(inputs)
            .map(|(d, v)| (d.name, v.clone()))
            .collect();
        let mut next_mems = vec![];
        let mut pending: Vec<usize> = (0..node.equations.len()).collect();

        while !pending.is_empty() {
            let Some(pos) = pending
                .iter()
                .position(|&i| self.ready(&node.equations[i], &env))
            else {
                return Err(Error::eval(format!(
                    "evaluation of `{}' is blocked by a causality cycle",
                    node.name
                )));
            };
            let i = pending.remove(pos);
            match &node.equations[i] {
                Equation::Def { lhs, rhs } => {
                    let value = if self.var_active(*lhs, &env)? {
                        Some(self.eval_cexpr(rhs, &env)?)
                    } else {
                        None
                    };
                    env.insert(*lhs, value);
                }
                Equation::Fby { lhs, rhs, .. } => {
                    if self.var_active(*lhs, &env)? {
                        next_mems.push((*lhs, self.eval(rhs, &env)?));
                    }
                }
                Equation::Call {
                    lhs,
                    args,
                    clock,
                    reset,
                    ..
                } => {
                    if self.clock_active(clock, &env)? {
                        let args = args
                            .iter()
                            .map(|a| self.eval(a, &env).map(Some))
                            .collect::<CadenceResult<Vec<_>>>()?;
                        let do_reset = match reset {
                            Some(r) => {
                                self.read(*r, &env)? == Const::Bool(true)
                            }
                            None => false,
                        };
                        let sub = self.subs.get_mut(&i).ok_or_else(|| {
                            Error::eval("missing sub-node state")
                        })?;
                        if do_reset {
                            sub.reset()?;
                        }
                        let outs = sub.step(&args)?;
                        for (o, v) in lhs.iter().zip(outs) {
                            env.insert(*o, v);
                        }
                    } else {
                        for o in lhs {
                            env.insert(*o, None);
                        }
                    }
                }
            }
        }

        self.mems.extend(next_mems);
        Ok(node
            .outputs
            .iter()
            .map(|o| env.get(&o.name).cloned().flatten())
            .collect())
    }

    fn var_active(
        &self,
        var: Id,
        env: &HashMap<Id, Value>,
    ) -> CadenceResult<bool> {
        let (decl, _) = self
            .node
            .find_var(var)
            .ok_or_else(|| Error::undefined(var, "variable"))?;
        self.clock_active(&decl.clock, env)
    }

    fn clock_active(
        &self,
        clock: &Clock,
        env: &HashMap<Id, Value>,
    ) -> CadenceResult<bool> {
        for (var, polarity) in clock.conditions() {
            let value = if self.node.is_memory(var) {
                self.mems.get(&var).cloned()
            } else {
                env.get(&var).cloned().flatten()
            };
            match value {
                Some(Const::Bool(b)) if b == polarity => (),
                Some(Const::Bool(_)) | None => return Ok(false),
                Some(c) => {
                    return Err(Error::eval(format!(
                        "clock `{var}' has non-boolean value {c}"
                    )))
                }
            }
        }
        Ok(true)
    }

    fn read(&self, var: Id, env: &HashMap<Id, Value>) -> CadenceResult<Const> {
        if self.node.is_memory(var) {
            return self.mems.get(&var).cloned().ok_or_else(|| {
                Error::eval(format!("memory `{var}' read before reset"))
            });
        }
        match env.get(&var) {
            Some(Some(v)) => Ok(v.clone()),
            Some(None) => Err(Error::eval(format!(
                "`{var}' read while absent in `{}'",
                self.node.name
            ))),
            None => self
                .ctx
                .const_value(var)
                .cloned()
                .ok_or_else(|| Error::undefined(var, "variable")),
        }
    }

    fn eval(
        &self,
        expr: &Expr,
        env: &HashMap<Id, Value>,
    ) -> CadenceResult<Const> {
        match expr {
            Expr::Const(c) => Ok(c.clone()),
            Expr::Var(v) => self.read(*v, env),
            Expr::Unop { op, arg } => {
                ops::eval_unop(*op, &self.eval(arg, env)?)
            }
            Expr::Binop { op, lhs, rhs } => ops::eval_binop(
                *op,
                &self.eval(lhs, env)?,
                &self.eval(rhs, env)?,
            ),
            Expr::When { expr, .. } => self.eval(expr, env),
            Expr::Pre(_) | Expr::Arrow { .. } | Expr::App { .. } => {
                Err(Error::eval(format!(
                    "`{expr}' must be normalized before evaluation"
                )))
            }
        }
    }

    fn eval_cexpr(
        &self,
        expr: &CExpr,
        env: &HashMap<Id, Value>,
    ) -> CadenceResult<Const> {
        match expr {
            CExpr::Merge {
                var,
                on_true,
                on_false,
            } => match self.read(*var, env)? {
                Const::Bool(true) => self.eval_cexpr(on_true, env),
                Const::Bool(false) => self.eval_cexpr(on_false, env),
                c => Err(Error::eval(format!(
                    "merge on `{var}' with non-boolean value {c}"
                ))),
            },
            CExpr::If { cond, then, els } => match self.eval(cond, env)? {
                Const::Bool(true) => self.eval_cexpr(then, env),
                Const::Bool(false) => self.eval_cexpr(els, env),
                c => Err(Error::eval(format!(
                    "condition evaluated to non-boolean {c}"
                ))),
            },
            CExpr::Exp(e) => self.eval(e, env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_to_ir;
    use cadence_frontend::{
        BinOp, Decl, Program, Type, VarDecl, Workspace,
    };

    fn counter_ctx() -> Context {
        let mut n = Node::new("counter");
        n.outputs.push(VarDecl::new("out", Type::Int));
        n.memories.push(VarDecl::new("c", Type::Int));
        n.equations.push(Equation::def("out", Expr::var("c")));
        n.equations.push(Equation::fby(
            "c",
            Some(Const::Int(0)),
            Expr::binop(BinOp::Add, Expr::var("c"), Expr::int(1)),
        ));
        let mut p = Program::new("M");
        p.decls.push(Decl::Node(n));
        ast_to_ir(Workspace::from_program(p)).unwrap()
    }

    #[test]
    fn counter_streams() {
        let ctx = counter_ctx();
        let mut ev = StreamEvaluator::new(&ctx, "counter".into()).unwrap();
        let outs = ev.run(&[vec![], vec![], vec![]]).unwrap();
        assert_eq!(
            outs,
            vec![
                vec![Some(Const::Int(0))],
                vec![Some(Const::Int(1))],
                vec![Some(Const::Int(2))]
            ]
        );
    }

    #[test]
    fn cycles_block_evaluation() {
        let mut n = Node::new("loop");
        n.outputs.push(VarDecl::new("a", Type::Int));
        n.locals.push(VarDecl::new("b", Type::Int));
        n.equations.push(Equation::def(
            "a",
            Expr::binop(BinOp::Add, Expr::var("b"), Expr::int(1)),
        ));
        n.equations.push(Equation::def(
            "b",
            Expr::binop(BinOp::Add, Expr::var("a"), Expr::int(1)),
        ));
        let mut p = Program::new("M");
        p.decls.push(Decl::Node(n));
        let ctx = ast_to_ir(Workspace::from_program(p)).unwrap();
        let mut ev = StreamEvaluator::new(&ctx, "loop".into()).unwrap();
        ev.reset().unwrap();
        assert!(ev.step(&[]).is_err());
    }
}
