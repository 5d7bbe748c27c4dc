// Scorch Compiler Module
// Analysis, code generation and the driver that sequences them

mod analyzer;
pub mod chunk;
pub mod codegen;
pub mod driver;
pub mod opcode;
pub mod scope;
pub mod unit;

pub use analyzer::AnalyzeContext;
pub use chunk::{Chunk, Constant, Handler};
pub use codegen::{generate, Label, WriteContext};
pub use driver::{analyze, compile, AnalyzedProgram, Compilation, Stage, LOOP_COUNTER};
pub use opcode::OpCode;
pub use scope::{Scopes, Variable};
pub use unit::{CompiledScript, ParamSlot};
