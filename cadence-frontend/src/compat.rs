//! Structural comparison of declared and computed node interfaces.
use crate::ast::{NodeSignature, VarDecl};
use cadence_utils::{CadenceResult, Error, Id, MismatchField};
use std::collections::HashMap;

/// A single disagreement between two signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub node: Id,
    pub field: MismatchField,
    pub msg: String,
}

impl From<Mismatch> for Error {
    fn from(m: Mismatch) -> Self {
        Error::InterfaceCompatibility {
            node: m.node,
            field: m.field,
            msg: m.msg,
        }
    }
}

/// Compare a declared signature with the computed one for the same node.
/// Clocks are compared modulo the positional renaming of parameters: a
/// declared `y :: base on x` matches a computed `b :: base on a` whenever `x`
/// and `a` (and `y` and `b`) occupy the same position.
pub fn compare_signature(
    declared: &NodeSignature,
    computed: &NodeSignature,
) -> Vec<Mismatch> {
    let node = declared.name;
    let mut out = vec![];
    let arity = |kind: &str, d: &[VarDecl], c: &[VarDecl]| {
        (d.len() != c.len()).then(|| Mismatch {
            node,
            field: MismatchField::Arity,
            msg: format!(
                "declared with {} {kind}s, computed with {}",
                d.len(),
                c.len()
            ),
        })
    };
    out.extend(arity("input", &declared.inputs, &computed.inputs));
    out.extend(arity("output", &declared.outputs, &computed.outputs));
    if !out.is_empty() {
        return out;
    }

    let renaming: HashMap<Id, Id> = declared
        .inputs
        .iter()
        .zip(&computed.inputs)
        .chain(declared.outputs.iter().zip(&computed.outputs))
        .map(|(d, c)| (d.name, c.name))
        .collect();

    let params = declared
        .inputs
        .iter()
        .zip(&computed.inputs)
        .map(|p| ("input", p))
        .chain(
            declared
                .outputs
                .iter()
                .zip(&computed.outputs)
                .map(|p| ("output", p)),
        );

    for (kind, (d, c)) in params {
        if d.ty != c.ty {
            out.push(Mismatch {
                node,
                field: MismatchField::Type,
                msg: format!(
                    "{kind} `{}' is declared {}, computed {}",
                    d.name, d.ty, c.ty
                ),
            });
        } else if d.clock.renamed(&renaming) != c.clock {
            out.push(Mismatch {
                node,
                field: MismatchField::Clock,
                msg: format!(
                    "{kind} `{}' is declared on `{}', computed on `{}'",
                    d.name, d.clock, c.clock
                ),
            });
        }
    }
    out
}

/// Check every declared node against the computed signatures. The first
/// mismatch is returned as an error; the remaining ones are logged.
pub fn check_compatibility(
    declared: &[NodeSignature],
    computed: &[NodeSignature],
) -> CadenceResult<()> {
    let mut mismatches = declared.iter().flat_map(|d| {
        match computed.iter().find(|c| c.name == d.name) {
            Some(c) => compare_signature(d, c),
            None => vec![Mismatch {
                node: d.name,
                field: MismatchField::Missing,
                msg: "declared in the interface but not defined".to_string(),
            }],
        }
    });

    let Some(first) = mismatches.next() else {
        return Ok(());
    };
    for other in mismatches {
        log::error!(
            "Interface of node `{}' is incompatible ({}): {}",
            other.node,
            other.field,
            other.msg
        );
    }
    Err(first.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Clock, Type};

    fn sig(
        name: &str,
        inputs: Vec<VarDecl>,
        outputs: Vec<VarDecl>,
    ) -> NodeSignature {
        NodeSignature {
            name: name.into(),
            inputs,
            outputs,
        }
    }

    #[test]
    fn identical_signatures_are_compatible() {
        let s = sig(
            "N",
            vec![VarDecl::new("x", Type::Int)],
            vec![VarDecl::new("y", Type::Int)],
        );
        assert!(check_compatibility(&[s.clone()], &[s]).is_ok());
    }

    #[test]
    fn type_mismatch_names_node_and_field() {
        let declared = sig(
            "N",
            vec![VarDecl::new("x", Type::Int)],
            vec![VarDecl::new("y", Type::Int)],
        );
        let computed = sig(
            "N",
            vec![VarDecl::new("x", Type::Int)],
            vec![VarDecl::new("y", Type::Bool)],
        );
        match check_compatibility(&[declared], &[computed]) {
            Err(Error::InterfaceCompatibility { node, field, .. }) => {
                assert_eq!(node, "N");
                assert_eq!(field, MismatchField::Type);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn clocks_compare_modulo_parameter_names() {
        let declared = sig(
            "N",
            vec![VarDecl::new("c", Type::Bool), VarDecl::new("x", Type::Int)],
            vec![VarDecl::new("y", Type::Int)
                .with_clock(Clock::on(Clock::Base, "c".into(), true))],
        );
        let computed = sig(
            "N",
            vec![VarDecl::new("k", Type::Bool), VarDecl::new("v", Type::Int)],
            vec![VarDecl::new("o", Type::Int)
                .with_clock(Clock::on(Clock::Base, "k".into(), true))],
        );
        assert!(compare_signature(&declared, &computed).is_empty());

        let mut wrong = computed.clone();
        wrong.outputs[0].clock = Clock::on(Clock::Base, "k".into(), false);
        let ms = compare_signature(&declared, &wrong);
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].field, MismatchField::Clock);
    }

    #[test]
    fn arity_and_missing() {
        let declared = sig("N", vec![VarDecl::new("x", Type::Int)], vec![]);
        let computed = sig("N", vec![], vec![]);
        assert_eq!(
            compare_signature(&declared, &computed)[0].field,
            MismatchField::Arity
        );
        let err = check_compatibility(&[declared], &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::InterfaceCompatibility {
                field: MismatchField::Missing,
                ..
            }
        ));
    }
}
