//! Semantics of the primitive operators. Integer arithmetic wraps.
use cadence_frontend::{BinOp, Const, Real, UnOp};
use cadence_utils::{CadenceResult, Error};
use std::cmp::Ordering;

fn type_error(op: impl std::fmt::Display, args: &[&Const]) -> Error {
    Error::eval(format!(
        "operator `{op}' is not defined on ({})",
        args.iter()
            .map(|c| format!("{c}: {}", c.ty()))
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

pub fn eval_unop(op: UnOp, arg: &Const) -> CadenceResult<Const> {
    match (op, arg) {
        (UnOp::Neg, Const::Int(n)) => Ok(Const::Int(n.wrapping_neg())),
        (UnOp::Neg, Const::Real(r)) => Ok(Const::Real(Real(-r.0))),
        (UnOp::Not, Const::Bool(b)) => Ok(Const::Bool(!b)),
        _ => Err(type_error(op, &[arg])),
    }
}

fn compare(lhs: &Const, rhs: &Const) -> Option<Ordering> {
    match (lhs, rhs) {
        (Const::Int(a), Const::Int(b)) => Some(a.cmp(b)),
        (Const::Real(a), Const::Real(b)) => a.0.partial_cmp(&b.0),
        (Const::Bool(a), Const::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

pub fn eval_binop(op: BinOp, lhs: &Const, rhs: &Const) -> CadenceResult<Const> {
    use BinOp::*;
    let res = match (op, lhs, rhs) {
        (Add, Const::Int(a), Const::Int(b)) => Const::Int(a.wrapping_add(*b)),
        (Sub, Const::Int(a), Const::Int(b)) => Const::Int(a.wrapping_sub(*b)),
        (Mul, Const::Int(a), Const::Int(b)) => Const::Int(a.wrapping_mul(*b)),
        (Div | Mod, Const::Int(_), Const::Int(0)) => {
            return Err(Error::eval("integer division by zero"))
        }
        (Div, Const::Int(a), Const::Int(b)) => Const::Int(a.wrapping_div(*b)),
        (Mod, Const::Int(a), Const::Int(b)) => Const::Int(a.wrapping_rem(*b)),
        (Add, Const::Real(a), Const::Real(b)) => Const::Real(Real(a.0 + b.0)),
        (Sub, Const::Real(a), Const::Real(b)) => Const::Real(Real(a.0 - b.0)),
        (Mul, Const::Real(a), Const::Real(b)) => Const::Real(Real(a.0 * b.0)),
        (Div, Const::Real(a), Const::Real(b)) => Const::Real(Real(a.0 / b.0)),
        (And, Const::Bool(a), Const::Bool(b)) => Const::Bool(*a && *b),
        (Or, Const::Bool(a), Const::Bool(b)) => Const::Bool(*a || *b),
        (Xor, Const::Bool(a), Const::Bool(b)) => Const::Bool(a != b),
        (Eq, a, b) if a.ty() == b.ty() => Const::Bool(a == b),
        (Ne, a, b) if a.ty() == b.ty() => Const::Bool(a != b),
        (Lt | Le | Gt | Ge, a, b) => {
            let Some(ord) = compare(a, b) else {
                return Err(type_error(op, &[lhs, rhs]));
            };
            Const::Bool(match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
        _ => return Err(type_error(op, &[lhs, rhs])),
    };
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            eval_binop(BinOp::Add, &Const::Int(i64::MAX), &Const::Int(1))
                .unwrap(),
            Const::Int(i64::MIN)
        );
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(
            eval_binop(BinOp::Div, &Const::Int(1), &Const::Int(0)).is_err()
        );
    }

    #[test]
    fn comparisons_and_type_errors() {
        assert_eq!(
            eval_binop(BinOp::Le, &Const::Int(1), &Const::Int(1)).unwrap(),
            Const::Bool(true)
        );
        assert!(
            eval_binop(BinOp::Add, &Const::Int(1), &Const::Bool(true))
                .is_err()
        );
        assert!(eval_unop(UnOp::Not, &Const::Int(1)).is_err());
    }
}
