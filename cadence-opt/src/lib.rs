//! # Cadence machine compiler
//!
//! Analyses and passes that turn the nodes of a [cadence_ir::Context] into
//! machines and optimize them:
//! - [analysis::DependencyGraph] and [schedule::Scheduler] order the
//!   equations of a node and break the cycles created by memory updates.
//! - [translate::Translator] builds the machine of a scheduled node.
//! - [passes] wraps both into passes and provides the machine optimizations.
//! - [pass_manager::PassManager] runs named passes and aliases in order.
pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod schedule;
pub mod translate;
pub mod traversal;
