// Scorch Statement AST Nodes

use super::expr::Expr;
use crate::error::Location;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Control-flow facts about one statement, computed once by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flow {
    /// Every path leaves the compiled unit (return, throw)
    pub method_escape: bool,
    /// Every path leaves the nearest enclosing loop
    pub loop_escape: bool,
    /// No path falls through past this statement
    pub all_escape: bool,
    /// Some path continues the nearest enclosing loop
    pub any_continue: bool,
    /// Some path breaks out of the nearest enclosing loop
    pub any_break: bool,
    /// Statements in this subtree, including this one
    pub statement_count: usize,
    /// Final statement of the unit's outermost sequence
    pub last_source: bool,
    /// Final statement of the nearest enclosing loop body
    pub last_loop: bool,
}

/// An ordered sequence of statements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// One `catch (Type e) { ... }` clause of a try statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catch {
    /// Host exception class this clause matches; `None` catches everything
    #[serde(default)]
    pub exception: Option<String>,
    pub name: String,
    pub body: Block,
    pub location: Location,
    #[serde(skip)]
    pub(crate) slot: Option<u16>,
}

impl Catch {
    pub fn new(name: impl Into<String>, body: Block, location: Location) -> Self {
        Self {
            exception: None,
            name: name.into(),
            body,
            location,
            slot: None,
        }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

/// Statement variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    /// Nested scope: { ... }
    Block(Block),

    If {
        condition: Expr,
        then: Block,
        #[serde(default)]
        otherwise: Option<Block>,
    },

    While {
        condition: Expr,
        body: Block,
    },

    /// do { ... } while (condition)
    Do {
        body: Block,
        condition: Expr,
    },

    /// for (initializer; condition; afterthought) { ... }
    For {
        #[serde(default)]
        initializer: Option<Box<Stmt>>,
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        afterthought: Option<Expr>,
        body: Block,
    },

    Return {
        #[serde(default)]
        value: Option<Expr>,
    },

    Break,

    Continue,

    Try {
        body: Block,
        catches: Vec<Catch>,
    },

    Throw {
        value: Expr,
    },

    Expression {
        expr: Expr,
    },

    /// Typed local: int x = 1;
    Declaration {
        #[serde(rename = "type")]
        ty: Type,
        name: String,
        #[serde(default)]
        initializer: Option<Expr>,
        #[serde(skip)]
        slot: Option<u16>,
    },
}

/// A statement node with its location and flow annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    pub location: Location,
    #[serde(skip)]
    pub(crate) flow: Option<Flow>,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: Location) -> Self {
        Self {
            kind,
            location,
            flow: None,
        }
    }

    /// Flow annotations; `None` until the statement has been analyzed
    pub fn flow(&self) -> Option<&Flow> {
        self.flow.as_ref()
    }

    /// Short name of the statement kind, used in diagnostics and logs
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StmtKind::Block(_) => "block",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::Do { .. } => "do",
            StmtKind::For { .. } => "for",
            StmtKind::Return { .. } => "return",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Try { .. } => "try",
            StmtKind::Throw { .. } => "throw",
            StmtKind::Expression { .. } => "expression",
            StmtKind::Declaration { .. } => "declaration",
        }
    }
}

/// A parsed script: the outermost statement sequence
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Block,
    /// Script text, when the parser provides it, for rendering diagnostics
    #[serde(default)]
    pub source: Option<String>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self {
            body: Block::new(statements),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
