//! Front end of the Cadence compiler: the normalized dataflow AST produced by
//! the external parser and inference passes, workspace construction and the
//! compiled-header protocol used for separate compilation.
pub mod ast;
mod compat;
pub mod header;
mod workspace;

pub use ast::{
    BinOp, CExpr, Clock, Const, ConstDecl, Decl, Equation, Expr, Node,
    NodeSignature, Program, Real, Role, Type, TypeDecl, UnOp, VarDecl,
};
pub use compat::{check_compatibility, compare_signature, Mismatch};
pub use header::{
    check_dependency, read_header, read_interface, write_header,
    CompiledHeader, HeaderStore, Interface, Provenance,
};
pub use workspace::{load_program, Workspace};
