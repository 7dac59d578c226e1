//! Internal representation of the Cadence compiler: the compilation context
//! and the machines nodes are compiled into.
mod context;
mod from_ast;
mod machine;
mod printer;
mod rewriter;
mod schedule;

pub mod eval;

pub use context::{Context, ImportedNode};
pub use from_ast::ast_to_ir;
pub use machine::{
    Callee, Instance, Instr, Loc, MExpr, Machine, MachineIdx, MemCell,
};
pub use printer::Printer;
pub use rewriter::{RewriteMap, Rewriter};
pub use schedule::{Schedule, Snapshot};

// Re-export types from the front end.
pub use cadence_frontend::{
    BinOp, CExpr, Clock, Const, Equation, Expr, Node, NodeSignature, Type,
    UnOp, VarDecl,
};
pub use cadence_utils::{GetName, Id};
