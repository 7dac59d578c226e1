//! Translation of scheduled nodes into machines.
use cadence_frontend::{CExpr, Clock, Equation, Expr, Node};
use cadence_ir::{
    Callee, Context, Instance, Instr, MExpr, Machine, MemCell,
};
use cadence_utils::{CadenceResult, Error, Id, NameGenerator};
use std::collections::HashMap;

/// Builds the machine of a node whose equations are in scheduled order.
///
/// Every equation becomes a short instruction sequence wrapped in one `If`
/// per condition of its clock:
/// * `x = e` assigns `x`, with `merge` and `if` lowered to `If` blocks,
/// * `m = v fby e` writes the next value of memory cell `m`,
/// * `(ys) = f(es) every r` steps a fresh instance of `f`, reset first when
///   `r` is true.
///
/// Callees must already have a machine in the context or be imported.
pub struct Translator<'a> {
    ctx: &'a Context,
    node: &'a Node,
    namegen: NameGenerator,
    instances: Vec<Instance>,
}

impl<'a> Translator<'a> {
    pub fn translate(
        ctx: &'a Context,
        node: &'a Node,
    ) -> CadenceResult<Machine> {
        let mut tr = Translator {
            ctx,
            node,
            namegen: NameGenerator::with_prev_defined_names(
                node.vars().map(|(v, _)| v.name).collect(),
            ),
            instances: vec![],
        };

        let step = node
            .equations
            .iter()
            .map(|eq| tr.equation(eq))
            .collect::<CadenceResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        let memories = tr.memories()?;
        let reset = memories
            .iter()
            .map(|m| Instr::StateAssign {
                dst: m.name,
                src: MExpr::Const(m.init.clone()),
            })
            .chain(
                tr.instances
                    .iter()
                    .map(|i| Instr::Reset { instance: i.name }),
            )
            .collect();
        let asserts = node
            .asserts
            .iter()
            .map(|a| tr.expr(a))
            .collect::<CadenceResult<_>>()?;

        Ok(Machine {
            name: node.name,
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            locals: node.locals.clone(),
            memories,
            instances: tr.instances,
            step,
            reset,
            asserts,
        })
    }

    /// Memory cells with their value after reset.
    fn memories(&self) -> CadenceResult<Vec<MemCell>> {
        let inits: HashMap<Id, Option<_>> = self
            .node
            .equations
            .iter()
            .filter_map(|eq| match eq {
                Equation::Fby { lhs, init, .. } => Some((*lhs, init.clone())),
                _ => None,
            })
            .collect();
        self.node
            .memories
            .iter()
            .map(|m| {
                let init = match inits.get(&m.name).cloned().flatten() {
                    Some(c) => c,
                    None => self.ctx.type_default(&m.ty)?,
                };
                Ok(MemCell {
                    name: m.name,
                    ty: m.ty.clone(),
                    init,
                })
            })
            .collect()
    }

    fn clock_of(&self, var: Id) -> Clock {
        self.node
            .find_var(var)
            .map(|(decl, _)| decl.clock.clone())
            .unwrap_or_default()
    }

    /// Guard `body` by the conditions of `clock`.
    fn on_clock(
        &self,
        clock: &Clock,
        body: Vec<Instr>,
    ) -> CadenceResult<Vec<Instr>> {
        let mut body = body;
        for (var, polarity) in clock.conditions().into_iter().rev() {
            let cond = self.expr(&Expr::Var(var))?;
            body = vec![if polarity {
                Instr::If {
                    cond,
                    then: body,
                    els: vec![],
                }
            } else {
                Instr::If {
                    cond,
                    then: vec![],
                    els: body,
                }
            }];
        }
        Ok(body)
    }

    fn equation(&mut self, eq: &Equation) -> CadenceResult<Vec<Instr>> {
        match eq {
            Equation::Def { lhs, rhs } => {
                let body = self.cexpr(*lhs, rhs)?;
                self.on_clock(&self.clock_of(*lhs), body)
            }
            Equation::Fby { lhs, rhs, .. } => {
                let body = vec![Instr::StateAssign {
                    dst: *lhs,
                    src: self.expr(rhs)?,
                }];
                self.on_clock(&self.clock_of(*lhs), body)
            }
            Equation::Call {
                lhs,
                node,
                args,
                clock,
                reset,
            } => {
                let body = self.call(lhs, *node, args, *reset)?;
                self.on_clock(clock, body)
            }
        }
    }

    fn call(
        &mut self,
        lhs: &[Id],
        callee: Id,
        args: &[Expr],
        reset: Option<Id>,
    ) -> CadenceResult<Vec<Instr>> {
        let unresolved = || Error::UnresolvedCall {
            node: self.node.name,
            callee,
        };
        let target = match (
            self.ctx.machine_index.get(&callee),
            self.ctx.imports.get(&callee),
        ) {
            (Some(idx), _) => Callee::Local(*idx),
            (None, Some(imp)) => Callee::Imported { module: imp.module },
            (None, None) => return Err(unresolved()),
        };
        let sig = self.ctx.signature(callee).ok_or_else(unresolved)?;
        if sig.inputs.len() != args.len() || sig.outputs.len() != lhs.len() {
            return Err(Error::unsupported(
                self.node.name,
                format!(
                    "call to `{callee}' with {} argument(s) and {} \
                     result(s), expected {} and {}",
                    args.len(),
                    lhs.len(),
                    sig.inputs.len(),
                    sig.outputs.len()
                ),
            ));
        }

        let instance = self.namegen.gen_name(callee);
        self.instances.push(Instance {
            name: instance,
            node: callee,
            callee: target,
        });

        let mut body = vec![];
        if let Some(r) = reset {
            body.push(Instr::If {
                cond: self.expr(&Expr::Var(r))?,
                then: vec![Instr::Reset { instance }],
                els: vec![],
            });
        }
        body.push(Instr::Call {
            outs: lhs.to_vec(),
            instance,
            args: args
                .iter()
                .map(|a| self.expr(a))
                .collect::<CadenceResult<_>>()?,
        });
        Ok(body)
    }

    fn cexpr(&self, lhs: Id, rhs: &CExpr) -> CadenceResult<Vec<Instr>> {
        Ok(match rhs {
            CExpr::Merge {
                var,
                on_true,
                on_false,
            } => vec![Instr::If {
                cond: self.expr(&Expr::Var(*var))?,
                then: self.cexpr(lhs, on_true)?,
                els: self.cexpr(lhs, on_false)?,
            }],
            CExpr::If { cond, then, els } => vec![Instr::If {
                cond: self.expr(cond)?,
                then: self.cexpr(lhs, then)?,
                els: self.cexpr(lhs, els)?,
            }],
            CExpr::Exp(e) => vec![Instr::assign(lhs, self.expr(e)?)],
        })
    }

    fn expr(&self, e: &Expr) -> CadenceResult<MExpr> {
        Ok(match e {
            Expr::Const(c) => MExpr::Const(c.clone()),
            Expr::Var(v) => {
                if self.node.is_memory(*v) {
                    MExpr::State(*v)
                } else if self.node.find_var(*v).is_some() {
                    MExpr::Var(*v)
                } else if self.ctx.consts.contains_key(v) {
                    MExpr::Global(*v)
                } else {
                    return Err(Error::undefined(*v, "variable"));
                }
            }
            Expr::Unop { op, arg } => MExpr::unop(*op, self.expr(arg)?),
            Expr::Binop { op, lhs, rhs } => {
                MExpr::binop(*op, self.expr(lhs)?, self.expr(rhs)?)
            }
            // Sampling is carried by the clock of the defined variable.
            Expr::When { expr, .. } => self.expr(expr)?,
            Expr::Pre(_) | Expr::Arrow { .. } | Expr::App { .. } => {
                return Err(Error::unsupported(
                    self.node.name,
                    format!("`{e}' is not normalized"),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_frontend::{BinOp, Const, Type, VarDecl};
    use cadence_ir::Printer;

    fn counter() -> Node {
        let mut n = Node::new("counter");
        n.outputs.push(VarDecl::new("out", Type::Int));
        n.memories.push(VarDecl::new("c", Type::Int));
        n.equations = vec![
            Equation::def("out", Expr::var("c")),
            Equation::fby(
                "c",
                Some(Const::Int(0)),
                Expr::binop(BinOp::Add, Expr::var("c"), Expr::int(1)),
            ),
        ];
        n
    }

    #[test]
    fn memories_become_state() {
        let ctx = Context::new("m".into());
        let n = counter();
        let m = Translator::translate(&ctx, &n).unwrap();
        assert_eq!(
            m.step,
            vec![
                Instr::assign("out", MExpr::state("c")),
                Instr::StateAssign {
                    dst: "c".into(),
                    src: MExpr::binop(
                        BinOp::Add,
                        MExpr::state("c"),
                        MExpr::int(1)
                    ),
                },
            ]
        );
        assert_eq!(
            m.reset,
            vec![Instr::StateAssign {
                dst: "c".into(),
                src: MExpr::int(0)
            }]
        );
    }

    #[test]
    fn clocks_become_conditionals() {
        let ctx = Context::new("m".into());
        let mut n = Node::new("sample");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.inputs.push(VarDecl::new("k", Type::Bool));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.locals.push(
            VarDecl::new("w", Type::Int)
                .with_clock(Clock::on(Clock::Base, "k".into(), false)),
        );
        n.equations = vec![
            Equation::def("w", Expr::when(Expr::var("x"), "k", false)),
            Equation::def(
                "y",
                CExpr::merge("k", Expr::int(1).into(), Expr::var("w").into()),
            ),
        ];
        let m = Translator::translate(&ctx, &n).unwrap();
        let text = Printer::machine_to_str(&m);
        assert_eq!(
            m.step[0],
            Instr::If {
                cond: MExpr::var("k"),
                then: vec![],
                els: vec![Instr::assign("w", MExpr::var("x"))],
            }
        );
        assert!(text.contains("if k {"), "{text}");
    }

    #[test]
    fn unknown_callees_are_unresolved() {
        let ctx = Context::new("m".into());
        let mut n = Node::new("f");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.equations =
            vec![Equation::call(vec!["y".into()], "g", vec![Expr::var("x")])];
        assert!(matches!(
            Translator::translate(&ctx, &n),
            Err(Error::UnresolvedCall { .. })
        ));
    }

    #[test]
    fn calls_create_instances() {
        let mut ctx = Context::new("m".into());
        let callee = counter();
        let cm = Translator::translate(&ctx, &callee).unwrap();
        let idx = ctx.add_machine(cm);
        ctx.nodes.insert(callee.name, callee);

        let mut n = Node::new("top");
        n.inputs.push(VarDecl::new("r", Type::Bool));
        n.outputs.push(VarDecl::new("a", Type::Int));
        n.outputs.push(VarDecl::new("b", Type::Int));
        n.equations = vec![
            Equation::Call {
                lhs: vec!["a".into()],
                node: "counter".into(),
                args: vec![],
                clock: Clock::Base,
                reset: Some("r".into()),
            },
            Equation::call(vec!["b".into()], "counter", vec![]),
        ];
        let m = Translator::translate(&ctx, &n).unwrap();
        let names: Vec<_> = m.instances.iter().map(|i| i.name).collect();
        assert_eq!(names, vec![Id::from("counter"), Id::from("counter0")]);
        assert_eq!(m.instances[0].callee, Callee::Local(idx));
        assert_eq!(
            m.step[0],
            Instr::If {
                cond: MExpr::var("r"),
                then: vec![Instr::Reset {
                    instance: "counter".into()
                }],
                els: vec![],
            }
        );
        assert_eq!(m.reset.len(), 2);

        n.equations[1] = Equation::call(
            vec!["b".into()],
            "counter",
            vec![Expr::var("r")],
        );
        assert!(matches!(
            Translator::translate(&ctx, &n),
            Err(Error::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn unnormalized_expressions_are_rejected() {
        let ctx = Context::new("m".into());
        let mut n = Node::new("f");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.equations =
            vec![Equation::def("y", Expr::Pre(Box::new(Expr::var("x"))))];
        assert!(matches!(
            Translator::translate(&ctx, &n),
            Err(Error::UnsupportedConstruct { .. })
        ));
    }
}
