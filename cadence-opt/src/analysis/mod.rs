//! Analysis for Cadence programs.
//!
//! The analyses construct data-structures that make answering certain queries
//! about dataflow nodes and machines easier.
mod dependency_graph;
mod graph_coloring;
mod liveness;
mod read_write_set;

pub use dependency_graph::{DependencyGraph, EdgeKind};
pub use graph_coloring::GraphColoring;
pub use liveness::LiveRanges;
pub use read_write_set::ReadWriteSet;
