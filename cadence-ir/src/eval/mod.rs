//! Execution of machines and reference evaluation of nodes.
mod dataflow;
mod machine;
pub mod ops;

pub use dataflow::StreamEvaluator;
pub use machine::{MachineState, Simulator};

/// Value of a stream at one instant; `None` when the stream is absent.
pub type Value = Option<cadence_frontend::Const>;
