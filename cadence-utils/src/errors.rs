//! Errors generated by the compiler.
use crate::Id;
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Convinience wrapper to represent success or meaningul compiler error.
pub type CadenceResult<T> = std::result::Result<T, Error>;

/// The part of a node interface that disagrees between a declared and a
/// computed signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MismatchField {
    /// The type of an input or output differs.
    Type,
    /// The clock of an input or output differs.
    Clock,
    /// The number of inputs or outputs differs.
    Arity,
    /// The node is declared but never defined.
    Missing,
}

impl std::fmt::Display for MismatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MismatchField::Type => "type",
            MismatchField::Clock => "clock",
            MismatchField::Arity => "arity",
            MismatchField::Missing => "definition",
        };
        write!(f, "{s}")
    }
}

/// Fatal errors. Every variant aborts the compilation of the current unit.
#[derive(ThisError)]
pub enum Error {
    /// Same-step dependency cycle among the equations of a node.
    #[error(
        "Causality cycle in node `{node}' involving: {}",
        .vars.iter().join(", ")
    )]
    CausalityCycle { node: Id, vars: Vec<Id> },

    /// A call refers to a node that has no finalized machine or imported
    /// signature.
    #[error(
        "Node `{node}' calls `{callee}' which has no compiled machine or \
         imported signature"
    )]
    UnresolvedCall { node: Id, callee: Id },

    /// An equation uses a construct that cannot be lowered into machine
    /// instructions.
    #[error("Unsupported construct in node `{node}': {msg}")]
    UnsupportedConstruct { node: Id, msg: String },

    /// A compiled header is corrupt or has an unknown format version.
    #[error("Malformed compiled header {}: {msg}", .path.display())]
    HeaderFormat { path: PathBuf, msg: String },

    /// A compiled header was produced under an incompatible policy.
    #[error("Compiled header for module `{module}' cannot be used: {msg}")]
    HeaderDependencyMismatch { module: Id, msg: String },

    /// Declared and computed interface of a node disagree.
    #[error("Interface of node `{node}' is incompatible ({field}): {msg}")]
    InterfaceCompatibility {
        node: Id,
        field: MismatchField,
        msg: String,
    },

    /// Lookup of an undefined name.
    #[error("Undefined {kind} `{name}'")]
    Undefined { name: Id, kind: String },

    /// The program violates a structural invariant expected from the front
    /// end.
    #[error("Malformed program: {0}")]
    MalformedProgram(String),

    /// Simulation failed.
    #[error("Evaluation error: {0}")]
    Eval(String),

    #[error("{0}")]
    Misc(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl Error {
    pub fn undefined<S: ToString>(name: Id, kind: S) -> Self {
        Error::Undefined {
            name,
            kind: kind.to_string(),
        }
    }

    pub fn malformed<S: ToString>(msg: S) -> Self {
        Error::MalformedProgram(msg.to_string())
    }

    pub fn unsupported<S: ToString>(node: Id, msg: S) -> Self {
        Error::UnsupportedConstruct {
            node,
            msg: msg.to_string(),
        }
    }

    pub fn eval<S: ToString>(msg: S) -> Self {
        Error::Eval(msg.to_string())
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Error::Misc(msg.to_string())
    }

    pub fn io<S: ToString>(context: S, source: std::io::Error) -> Self {
        Error::Io {
            context: context.to_string(),
            source,
        }
    }

    /// Internal-consistency errors indicate a bug upstream of the core rather
    /// than a problem in the user's program.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::UnresolvedCall { .. } | Error::UnsupportedConstruct { .. }
        )
    }
}

// Conversion from other error types
impl From<std::fmt::Error> for Error {
    fn from(_err: std::fmt::Error) -> Self {
        Error::misc("Failed to write formatted output")
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io("IO error", err)
    }
}

/// Non-fatal diagnostics. Compilation proceeds after reporting them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// An input of a node is never read.
    UnusedInput { node: Id, var: Id },
    /// A memory of a node is never read outside its own update.
    UnusedMemory { node: Id, var: Id },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnusedInput { node, var } => {
                write!(f, "Input `{var}' of node `{node}' is never read")
            }
            Warning::UnusedMemory { node, var } => {
                write!(f, "Memory `{var}' of node `{node}' is never read")
            }
        }
    }
}
