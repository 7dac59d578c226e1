//! Implements a visitor for machine code.
//! Passes implemented as a Visitor are directly invoked on a [Context] to
//! rewrite every [Machine] of the arena.
use super::action::{Action, VisResult};
use super::{ConstructVisitor, MachineTraversal, Named};
use cadence_ir::{Context, Instr, Machine};
use cadence_utils::CadenceResult;

/// The visiting interface for machines.
///
/// [Visitor::start] and [Visitor::finish] are called on every machine, and
/// [Visitor::start_instr] on every instruction in between, top-down. The
/// `reset` block is visited before the `step` block. Returning
/// [Action::SkipChildren] from `start` skips the instructions.
///
/// A pass will usually override one or more function and rely on the
/// default visitors to automatically visit the children.
pub trait Visitor {
    /// Define the traversal over a machine.
    /// Calls [Visitor::start], visits the `reset` and `step` blocks, and
    /// finally calls [Visitor::finish].
    fn traverse_machine(
        &mut self,
        machine: &mut Machine,
        ctx: &Context,
        machines: &[Machine],
    ) -> CadenceResult<()>
    where
        Self: Sized,
    {
        self.start(machine, ctx, machines)?
            .and_then(|| {
                machine
                    .reset
                    .visit(self, ctx)?
                    .and_then(|| machine.step.visit(self, ctx))
            })?
            .pop()
            .and_then(|| self.finish(machine, ctx, machines))?;
        Ok(())
    }

    /// Run the visitor on every machine of the context, in arena order.
    ///
    /// After visiting a machine, it calls [ConstructVisitor::clear_data] to
    /// reset the struct.
    fn do_pass(&mut self, context: &mut Context) -> CadenceResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        // Temporarily take ownership of the machines from the context.
        let machines = std::mem::take(&mut context.machines);
        let mut po = MachineTraversal::new(machines);
        let ctx = &*context;
        let res = po.apply_update(|machine, machines| {
            self.traverse_machine(machine, ctx, machines)?;
            self.clear_data();
            Ok(())
        });
        context.machines = po.take();
        res
    }

    /// Build a [Default] implementation of this pass and call
    /// [Visitor::do_pass] using it.
    #[inline(always)]
    fn do_pass_default(context: &mut Context) -> CadenceResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*context)?;
        visitor.do_pass(context)?;
        Ok(visitor)
    }

    /// Executed before the traversal begins.
    fn start(
        &mut self,
        _machine: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed after the traversal ends.
    /// This method is always invoked regardless of the [Action] returned from
    /// the children.
    fn finish(
        &mut self,
        _machine: &mut Machine,
        _ctx: &Context,
        _machines: &[Machine],
    ) -> VisResult {
        Ok(Action::Continue)
    }

    /// Executed before visiting the branches of an `If`.
    fn start_instr(&mut self, _instr: &mut Instr, _ctx: &Context) -> VisResult {
        Ok(Action::Continue)
    }
}

/// Describes types that can be visited by things implementing [Visitor].
/// This performs a recursive walk of the tree, calling
/// [Visitor::start_instr] on the way down.
pub trait Visitable {
    /// Perform the traversal.
    fn visit(&mut self, visitor: &mut dyn Visitor, ctx: &Context) -> VisResult;
}

impl Visitable for Vec<Instr> {
    fn visit(&mut self, visitor: &mut dyn Visitor, ctx: &Context) -> VisResult {
        for instr in self.iter_mut() {
            instr.visit(visitor, ctx)?;
        }
        Ok(Action::Continue)
    }
}

impl Visitable for Instr {
    fn visit(&mut self, visitor: &mut dyn Visitor, ctx: &Context) -> VisResult {
        visitor
            .start_instr(self, ctx)?
            .and_then(|| match self {
                Instr::If { then, els, .. } => then
                    .visit(visitor, ctx)?
                    .and_then(|| els.visit(visitor, ctx)),
                _ => Ok(Action::Continue),
            })
            .map(Action::pop)
    }
}
