//! Shared utilities for the Cadence compiler.
mod errors;
mod id;
mod namegenerator;
mod out_file;

pub use errors::{CadenceResult, Error, MismatchField, Warning};
pub use id::{GSym, GetName, Id};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
