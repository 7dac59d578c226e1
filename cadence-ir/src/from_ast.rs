//! Build a [Context] from a [Workspace].
use crate::{Context, ImportedNode};
use cadence_frontend::{Node, Type, Workspace};
use cadence_utils::{CadenceResult, Error, Id};
use std::collections::HashSet;

/// Tracks top-level names to enforce uniqueness across the module and its
/// imports.
#[derive(Default)]
struct Names {
    seen: HashSet<Id>,
}

impl Names {
    fn declare(&mut self, name: Id, origin: Id) -> CadenceResult<()> {
        if !self.seen.insert(name) {
            return Err(Error::malformed(format!(
                "`{name}' (from module `{origin}') is declared more than once"
            )));
        }
        Ok(())
    }
}

/// Construct the compilation context of a workspace.
///
/// Checks that top-level names are unique, that every node satisfies the
/// definition invariants and that every name read by an equation, clock or
/// assertion is declared. Calls are not resolved here.
pub fn ast_to_ir(ws: Workspace) -> CadenceResult<Context> {
    let Workspace {
        program, imports, ..
    } = ws;
    let mut ctx = Context::new(program.name);
    let mut names = Names::default();

    for header in imports.values() {
        for ty in &header.types {
            names.declare(ty.name, header.module)?;
            ctx.types.insert(ty.name, ty.clone());
        }
        for c in &header.consts {
            names.declare(c.name, header.module)?;
            ctx.consts.insert(c.name, c.clone());
        }
        for sig in &header.nodes {
            names.declare(sig.name, header.module)?;
            ctx.imports.insert(
                sig.name,
                ImportedNode {
                    module: header.module,
                    signature: sig.clone(),
                },
            );
        }
    }

    for ty in program.types() {
        names.declare(ty.name, program.name)?;
        ctx.types.insert(ty.name, ty.clone());
    }
    for c in program.consts() {
        names.declare(c.name, program.name)?;
        ctx.consts.insert(c.name, c.clone());
    }
    for node in program.nodes() {
        names.declare(node.name, program.name)?;
        ctx.nodes.insert(node.name, node.clone());
    }

    for node in ctx.nodes.values() {
        node.check_definitions()?;
        check_names(&ctx, node)?;
    }

    log::debug!(
        "Context for `{}': {} node(s), {} imported",
        ctx.module,
        ctx.nodes.len(),
        ctx.imports.len()
    );
    Ok(ctx)
}

fn check_names(ctx: &Context, node: &Node) -> CadenceResult<()> {
    let declared: HashSet<Id> = node.vars().map(|(v, _)| v.name).collect();
    let check_var = |name: Id| {
        if declared.contains(&name) || ctx.consts.contains_key(&name) {
            Ok(())
        } else {
            Err(Error::undefined(name, "variable"))
        }
    };

    for (var, _) in node.vars() {
        if let Type::Enum(ty) = &var.ty {
            if !ctx.types.contains_key(ty) {
                return Err(Error::undefined(*ty, "type"));
            }
        }
        for ck in var.clock.vars() {
            if !declared.contains(&ck) {
                return Err(Error::undefined(ck, "clock variable"));
            }
        }
    }

    for eq in &node.equations {
        eq.reads().into_iter().try_for_each(check_var)?;
    }
    for assert in &node.asserts {
        let mut reads = vec![];
        assert.reads(&mut reads);
        reads.into_iter().try_for_each(check_var)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_frontend::{
        CompiledHeader, ConstDecl, Const, Decl, Equation, Expr, Program,
        VarDecl,
    };

    fn program(eqs: Vec<Equation>) -> Program {
        let mut n = Node::new("f");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", Type::Int));
        n.equations = eqs;
        let mut p = Program::new("M");
        p.decls.push(Decl::Const(ConstDecl {
            name: "K".into(),
            ty: Type::Int,
            value: Const::Int(4),
        }));
        p.decls.push(Decl::Node(n));
        p
    }

    #[test]
    fn constants_are_readable() {
        let p = program(vec![Equation::def(
            "y",
            Expr::binop(
                cadence_frontend::BinOp::Add,
                Expr::var("x"),
                Expr::var("K"),
            ),
        )]);
        let ctx = ast_to_ir(Workspace::from_program(p)).unwrap();
        assert_eq!(ctx.const_value("K".into()), Some(&Const::Int(4)));
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn undeclared_reads_are_rejected() {
        let p = program(vec![Equation::def("y", Expr::var("z"))]);
        assert!(matches!(
            ast_to_ir(Workspace::from_program(p)),
            Err(Error::Undefined { .. })
        ));
    }

    #[test]
    fn imported_names_must_not_clash() {
        let p = program(vec![Equation::def("y", Expr::var("x"))]);
        let mut header = CompiledHeader::from_program(&p);
        header.module = "P".into();
        let ws = Workspace::with_imports(p, vec![header]);
        assert!(matches!(
            ast_to_ir(ws),
            Err(Error::MalformedProgram(_))
        ));
    }
}
