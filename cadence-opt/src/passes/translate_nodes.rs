use super::ScheduleNodes;
use crate::translate::Translator;
use crate::traversal::{node_post_order, ConstructVisitor, Named, Visitor};
use cadence_ir::Context;
use cadence_utils::CadenceResult;

/// Compiles every node into a machine of the context arena. Callees are
/// compiled before their callers; nodes without a schedule are scheduled
/// first. A node that already has a machine is not compiled again.
#[derive(Default)]
pub struct TranslateNodes;

impl Named for TranslateNodes {
    fn name() -> &'static str {
        "translate"
    }

    fn description() -> &'static str {
        "translate scheduled nodes into machines"
    }
}

impl Visitor for TranslateNodes {
    fn do_pass(&mut self, ctx: &mut Context) -> CadenceResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        for name in node_post_order(ctx)? {
            if ctx.machine_index.contains_key(&name) {
                continue;
            }
            if !ctx.schedules.contains_key(&name) {
                ScheduleNodes::schedule_node(ctx, name)?;
            }
            let node = ctx.node(name)?;
            let machine = Translator::translate(ctx, node)?;
            log::debug!(
                "{name}: {} instruction(s), {} instance(s)",
                machine.step_size(),
                machine.instances.len()
            );
            ctx.add_machine(machine);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::*;
    use cadence_ir::{eval::Simulator, Callee, Const, Id};

    #[test]
    fn callees_are_compiled_first() {
        let mut ctx = context(vec![twice(), counter()]);
        TranslateNodes::do_pass_default(&mut ctx).unwrap();
        let names: Vec<_> = ctx.machines.iter().map(|m| m.name).collect();
        assert_eq!(names, vec![Id::from("counter"), Id::from("twice")]);
        let top = ctx.find_machine("twice".into()).unwrap();
        let counter = Callee::Local(ctx.machine_index[&Id::from("counter")]);
        assert!(top.instances.iter().all(|i| i.callee == counter));
    }

    #[test]
    fn counter_scenario() {
        let ctx = compile(vec![counter()]);
        let mut sim = Simulator::new(&ctx, "counter".into()).unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.memory("c".into()), Some(&Const::Int(0)));
        assert_eq!(sim.step(&[]).unwrap(), vec![Some(Const::Int(0))]);
        assert_eq!(sim.memory("c".into()), Some(&Const::Int(1)));
        assert_eq!(sim.step(&[]).unwrap(), vec![Some(Const::Int(1))]);
        assert_eq!(sim.memory("c".into()), Some(&Const::Int(2)));
    }

    #[test]
    fn translation_is_deterministic() {
        let a = compile(sample_nodes());
        let b = compile(sample_nodes());
        assert_eq!(a.machines, b.machines);
    }

    #[test]
    fn machines_agree_with_equations() {
        let ctx = compile(sample_nodes());
        for (node, trace) in sample_traces() {
            assert_equivalent(&ctx, node, &trace);
        }
    }
}
