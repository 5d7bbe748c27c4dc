// Scorch AST Module
// Statement and expression nodes produced by the parser and annotated by the analyzer

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;
