// Scorch - Common test utilities

//! Builders for hand-assembled programs, standing in for the parser.
//!
//! In a test file:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code, unused_imports)]

pub use scorch_core::ast::*;
pub use scorch_core::compiler::{analyze, generate, AnalyzedProgram, OpCode};
pub use scorch_core::{
    compile, AnalysisErrorKind, CompileError, CompilerSettings, FunctionSignature, Location,
    ScriptContext, Type,
};

pub fn loc(line: usize) -> Location {
    Location::new(line, 0, "")
}

// ==================== Expressions ====================

pub fn int(value: i64, line: usize) -> Expr {
    Expr::literal(Literal::Int(value), loc(line))
}

pub fn double(value: f64, line: usize) -> Expr {
    Expr::literal(Literal::Double(value), loc(line))
}

pub fn boolean(value: bool, line: usize) -> Expr {
    Expr::literal(Literal::Bool(value), loc(line))
}

pub fn string(value: &str, line: usize) -> Expr {
    Expr::literal(Literal::String(value.to_string()), loc(line))
}

pub fn var(name: &str, line: usize) -> Expr {
    Expr::variable(name, loc(line))
}

pub fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let line = left.location.line;
    Expr::binary(op, left, right, loc(line))
}

pub fn call(name: &str, args: Vec<Expr>, line: usize) -> Expr {
    Expr::call(name, args, loc(line))
}

pub fn regex(pattern: &str, flags: &str, line: usize) -> Expr {
    Expr::new(
        ExprKind::Regex {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
        },
        loc(line),
    )
}

// ==================== Statements ====================

pub fn block(statements: Vec<Stmt>) -> Block {
    Block::new(statements)
}

pub fn nested(statements: Vec<Stmt>, line: usize) -> Stmt {
    Stmt::new(StmtKind::Block(block(statements)), loc(line))
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    let line = expr.location.line;
    Stmt::new(StmtKind::Expression { expr }, loc(line))
}

/// `log("...")`, a void host call
pub fn log(line: usize) -> Stmt {
    expr_stmt(call("log", vec![string("x", line)], line))
}

pub fn decl(ty: Type, name: &str, initializer: Option<Expr>, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::Declaration {
            ty,
            name: name.to_string(),
            initializer,
            slot: None,
        },
        loc(line),
    )
}

pub fn ret(value: Option<Expr>, line: usize) -> Stmt {
    Stmt::new(StmtKind::Return { value }, loc(line))
}

pub fn brk(line: usize) -> Stmt {
    Stmt::new(StmtKind::Break, loc(line))
}

pub fn cont(line: usize) -> Stmt {
    Stmt::new(StmtKind::Continue, loc(line))
}

pub fn throw(value: Expr, line: usize) -> Stmt {
    Stmt::new(StmtKind::Throw { value }, loc(line))
}

pub fn if_(condition: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>>, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::If {
            condition,
            then: block(then),
            otherwise: otherwise.map(block),
        },
        loc(line),
    )
}

pub fn while_(condition: Expr, body: Vec<Stmt>, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::While {
            condition,
            body: block(body),
        },
        loc(line),
    )
}

pub fn do_(body: Vec<Stmt>, condition: Expr, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::Do {
            body: block(body),
            condition,
        },
        loc(line),
    )
}

pub fn for_(
    initializer: Option<Stmt>,
    condition: Option<Expr>,
    afterthought: Option<Expr>,
    body: Vec<Stmt>,
    line: usize,
) -> Stmt {
    Stmt::new(
        StmtKind::For {
            initializer: initializer.map(Box::new),
            condition,
            afterthought,
            body: block(body),
        },
        loc(line),
    )
}

pub fn try_(body: Vec<Stmt>, catches: Vec<Catch>, line: usize) -> Stmt {
    Stmt::new(
        StmtKind::Try {
            body: block(body),
            catches,
        },
        loc(line),
    )
}

pub fn catch(name: &str, body: Vec<Stmt>, line: usize) -> Catch {
    Catch::new(name, block(body), loc(line))
}

// ==================== Compiling ====================

/// Parameters `_score: double`, `doc: def`, `flag: bool`; functions `log`,
/// `sqrt` and `random`
pub fn context(return_type: Type) -> ScriptContext {
    ScriptContext::new(return_type)
        .with_param("_score", Type::Double)
        .with_param("doc", Type::Def)
        .with_param("flag", Type::Bool)
        .with_function("log", FunctionSignature::new(vec![Type::String], Type::Void))
        .with_function("sqrt", FunctionSignature::new(vec![Type::Double], Type::Double))
        .with_function("random", FunctionSignature::new(vec![], Type::Double))
}

pub fn analyze_ok(return_type: Type, statements: Vec<Stmt>) -> AnalyzedProgram {
    analyze_with(return_type, &CompilerSettings::new(), statements)
        .unwrap_or_else(|e| panic!("analysis failed: {}", e))
}

pub fn analyze_err(return_type: Type, statements: Vec<Stmt>) -> CompileError {
    match analyze_with(return_type, &CompilerSettings::new(), statements) {
        Ok(_) => panic!("analysis unexpectedly succeeded"),
        Err(e) => e,
    }
}

pub fn analyze_with(
    return_type: Type,
    settings: &CompilerSettings,
    statements: Vec<Stmt>,
) -> Result<AnalyzedProgram, CompileError> {
    analyze(Program::new(statements), &context(return_type), settings)
}

/// Flow of the `index`th outermost statement
pub fn flow_of(analyzed: &AnalyzedProgram, index: usize) -> Flow {
    *analyzed.program().body.statements[index]
        .flow()
        .expect("statement was analyzed")
}

/// Settings with the loop guard turned off
pub fn unguarded() -> CompilerSettings {
    let mut settings = CompilerSettings::new();
    settings.max_loop_counter = 0;
    settings
}
