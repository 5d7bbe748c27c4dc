// Scorch Script Compiler
// Analysis and code generation core for scripts embedded in a search engine

pub mod ast;
pub mod compiler;
pub mod context;
pub mod error;
pub mod settings;
pub mod types;

pub use compiler::{compile, Compilation, CompiledScript, Stage};
pub use context::{FunctionSignature, Parameter, ScriptContext};
pub use error::{AnalysisErrorKind, CompileError, CompileResult, ErrorKind, Location};
pub use settings::{CompilerSettings, SettingsError};
pub use types::Type;
