//! # The Cadence Compiler
//!
//! This crate plumbs together the Cadence compiler crates and provides a
//! command-line interface for the compiler.
//! To use the compiler as a library, depend on the crates this one depends
//! on instead: [`cadence_frontend`], [`cadence_ir`], [`cadence_opt`].
pub mod cmdline;
pub mod driver;
