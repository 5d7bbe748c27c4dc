// Scorch Expression AST Nodes

use crate::error::Location;
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    // Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Logical (short-circuit)
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Negate, // -
    Not,    // !
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Null => Type::Null,
            Literal::Bool(_) => Type::Bool,
            Literal::Int(_) => Type::Int,
            Literal::Double(_) => Type::Double,
            Literal::String(_) => Type::String,
        }
    }
}

/// Expression variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    /// Literal value: 42, 1.5, "hello", true, null
    Literal { value: Literal },

    /// Regex literal: /pattern/flags
    Regex {
        pattern: String,
        #[serde(default)]
        flags: String,
    },

    /// Variable reference: x, _score
    Variable {
        name: String,
        #[serde(skip)]
        slot: Option<u16>,
    },

    /// Assignment to a variable: x = value
    Assign {
        name: String,
        value: Box<Expr>,
        #[serde(skip)]
        slot: Option<u16>,
    },

    /// Unary operation: -x, !done
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation: a + b, x == y, p && q
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional: condition ? then : otherwise
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Explicit conversion: (int) x
    Cast {
        #[serde(rename = "type")]
        ty: Type,
        #[serde(rename = "operand")]
        expr: Box<Expr>,
    },

    /// Host function call: sqrt(x)
    Call { name: String, args: Vec<Expr> },

    /// Field access on a dynamic value: doc.price
    Field { object: Box<Expr>, name: String },

    /// Index access on a dynamic value: doc["price"], values[0]
    Index { object: Box<Expr>, index: Box<Expr> },
}

/// An expression node with its location and analysis results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    pub location: Location,
    /// Type the expression produces, set by the analyzer
    #[serde(skip)]
    pub(crate) actual: Option<Type>,
    /// Type the parent consumes; a cast is emitted when it differs from `actual`
    #[serde(skip)]
    pub(crate) expected: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Self {
            kind,
            location,
            actual: None,
            expected: None,
        }
    }

    pub fn literal(value: Literal, location: Location) -> Self {
        Self::new(ExprKind::Literal { value }, location)
    }

    pub fn variable(name: impl Into<String>, location: Location) -> Self {
        Self::new(
            ExprKind::Variable {
                name: name.into(),
                slot: None,
            },
            location,
        )
    }

    pub fn assign(name: impl Into<String>, value: Expr, location: Location) -> Self {
        Self::new(
            ExprKind::Assign {
                name: name.into(),
                value: Box::new(value),
                slot: None,
            },
            location,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, location: Location) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            location,
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, location: Location) -> Self {
        Self::new(
            ExprKind::Call {
                name: name.into(),
                args,
            },
            location,
        )
    }

    pub fn actual(&self) -> Option<Type> {
        self.actual
    }

    pub fn expected(&self) -> Option<Type> {
        self.expected
    }

    /// The literal `true`, which makes a loop condition continuous
    pub fn is_constant_true(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Literal {
                value: Literal::Bool(true)
            }
        )
    }
}
