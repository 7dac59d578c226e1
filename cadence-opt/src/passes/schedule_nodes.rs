use crate::analysis::DependencyGraph;
use crate::schedule::Scheduler;
use crate::traversal::{node_post_order, ConstructVisitor, Named, Visitor};
use cadence_ir::Context;
use cadence_utils::{CadenceResult, Id, NameGenerator};

/// Orders the equations of every node so that each variable is computed
/// before it is read in the same step and each memory is read before it is
/// updated. Reports same-step causality cycles.
///
/// The computed [cadence_ir::Schedule] is stored in the context and applied
/// to the node. Nodes that already have a schedule are left alone.
#[derive(Default)]
pub struct ScheduleNodes;

impl Named for ScheduleNodes {
    fn name() -> &'static str {
        "schedule"
    }

    fn description() -> &'static str {
        "order node equations causally"
    }
}

impl ScheduleNodes {
    /// Schedule the node `name` of the context.
    pub fn schedule_node(ctx: &mut Context, name: Id) -> CadenceResult<()> {
        let node = ctx.node(name)?;
        let graph = DependencyGraph::build(node);
        let mut namegen = NameGenerator::with_prev_defined_names(
            node.vars().map(|(v, _)| v.name).collect(),
        );
        let schedule = Scheduler::schedule(node, &graph, &mut namegen)?;
        let warnings = Scheduler::warnings(node, &schedule);
        log::debug!(
            "{name}: {} equation(s), {} snapshot(s)",
            schedule.order.len(),
            schedule.snapshots.len()
        );

        if let Some(node) = ctx.nodes.get_mut(&name) {
            schedule.apply(node);
        }
        for warning in warnings {
            ctx.warn(warning);
        }
        ctx.schedules.insert(name, schedule);
        Ok(())
    }
}

impl Visitor for ScheduleNodes {
    fn do_pass(&mut self, ctx: &mut Context) -> CadenceResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        for name in node_post_order(ctx)? {
            if !ctx.schedules.contains_key(&name) {
                Self::schedule_node(ctx, name)?;
            }
        }
        Ok(())
    }
}
