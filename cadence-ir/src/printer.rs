//! Implements a formatter for machines. Used by `--dump-ir` and in test
//! failure messages.
use crate::{Context, Instr, MExpr, Machine};
use cadence_frontend::VarDecl;
use itertools::Itertools;
use std::io;

/// Printer for the machine IR.
pub struct Printer;

impl Printer {
    fn format_vars(vars: &[VarDecl]) -> String {
        vars.iter()
            .map(|v| {
                if v.clock == Default::default() {
                    format!("{}: {}", v.name, v.ty)
                } else {
                    format!("{}: {} :: {}", v.name, v.ty, v.clock)
                }
            })
            .join(", ")
    }

    /// Format and write every machine of the context, in dependency order.
    pub fn write_context<F: io::Write>(
        ctx: &Context,
        f: &mut F,
    ) -> io::Result<()> {
        for machine in &ctx.machines {
            Self::write_machine(machine, f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    pub fn write_machine<F: io::Write>(
        machine: &Machine,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(
            f,
            "machine {}({}) -> ({}) {{",
            machine.name,
            Self::format_vars(&machine.inputs),
            Self::format_vars(&machine.outputs),
        )?;
        if !machine.locals.is_empty() {
            writeln!(f, "  locals {};", Self::format_vars(&machine.locals))?;
        }
        for mem in &machine.memories {
            writeln!(f, "  memory {}: {} = {};", mem.name, mem.ty, mem.init)?;
        }
        for inst in &machine.instances {
            writeln!(f, "  instance {}: {};", inst.name, inst.node)?;
        }

        writeln!(f, "  reset {{")?;
        for instr in &machine.reset {
            Self::write_instr(instr, 4, f)?;
        }
        writeln!(f, "  }}")?;

        writeln!(f, "  step {{")?;
        for instr in &machine.step {
            Self::write_instr(instr, 4, f)?;
        }
        writeln!(f, "  }}")?;

        for assert in &machine.asserts {
            writeln!(f, "  assert {};", Self::expr_to_str(assert))?;
        }
        writeln!(f, "}}")
    }

    pub fn write_instr<F: io::Write>(
        instr: &Instr,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        write!(f, "{}", " ".repeat(indent_level))?;
        match instr {
            Instr::Assign { dst, src } => {
                writeln!(f, "{dst} := {};", Self::expr_to_str(src))
            }
            Instr::StateAssign { dst, src } => {
                writeln!(f, "state({dst}) := {};", Self::expr_to_str(src))
            }
            Instr::Call {
                outs,
                instance,
                args,
            } => {
                writeln!(
                    f,
                    "({}) := {instance}.step({});",
                    outs.iter().join(", "),
                    args.iter().map(Self::expr_to_str).join(", ")
                )
            }
            Instr::Reset { instance } => writeln!(f, "{instance}.reset();"),
            Instr::If { cond, then, els } => {
                writeln!(f, "if {} {{", Self::expr_to_str(cond))?;
                for i in then {
                    Self::write_instr(i, indent_level + 2, f)?;
                }
                if !els.is_empty() {
                    writeln!(f, "{}}} else {{", " ".repeat(indent_level))?;
                    for i in els {
                        Self::write_instr(i, indent_level + 2, f)?;
                    }
                }
                writeln!(f, "{}}}", " ".repeat(indent_level))
            }
        }
    }

    pub fn expr_to_str(expr: &MExpr) -> String {
        match expr {
            MExpr::Var(v) => v.to_string(),
            MExpr::State(s) => format!("state({s})"),
            MExpr::Const(c) => c.to_string(),
            MExpr::Global(g) => format!("::{g}"),
            MExpr::Unop { op, arg } => {
                format!("({op}{})", Self::expr_to_str(arg))
            }
            MExpr::Binop { op, lhs, rhs } => format!(
                "({} {op} {})",
                Self::expr_to_str(lhs),
                Self::expr_to_str(rhs)
            ),
        }
    }

    pub fn machine_to_str(machine: &Machine) -> String {
        let mut buf = Vec::new();
        // Writing to a vector cannot fail.
        let _ = Self::write_machine(machine, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
