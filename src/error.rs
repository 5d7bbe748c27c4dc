// Scorch Error Handling Module
// Compile errors with source locations and rendered diagnostics

use colored::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the script source, as reported by the parser
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    /// Human-readable label for the node (usually the source snippet)
    #[serde(default)]
    pub description: String,
}

impl Location {
    pub fn new(line: usize, column: usize, description: impl Into<String>) -> Self {
        Self {
            line,
            column,
            description: description.into(),
        }
    }

    /// Location for compiler-synthesized code that has no source counterpart
    pub fn synthetic() -> Self {
        Self::default()
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            line: 0,
            column: 0,
            description: String::new(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "[ {}:{} ]", self.line, self.column)
        } else {
            write!(f, "[ {}:{}: {} ]", self.line, self.column, self.description)
        }
    }
}

/// Ways a well-formed tree can still be rejected by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisErrorKind {
    UnreachableCode,
    DuplicateDeclaration,
    UndeclaredVariable,
    TypeMismatch,
    InvalidControlTransfer,
    UndefinedFunction,
    RegexDisabled,
    InvalidRegex,
    /// The script outgrows an instruction operand (constants, locals, jump offsets)
    LimitExceeded,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisErrorKind::UnreachableCode => write!(f, "UnreachableCode"),
            AnalysisErrorKind::DuplicateDeclaration => write!(f, "DuplicateDeclaration"),
            AnalysisErrorKind::UndeclaredVariable => write!(f, "UndeclaredVariable"),
            AnalysisErrorKind::TypeMismatch => write!(f, "TypeMismatch"),
            AnalysisErrorKind::InvalidControlTransfer => write!(f, "InvalidControlTransfer"),
            AnalysisErrorKind::UndefinedFunction => write!(f, "UndefinedFunction"),
            AnalysisErrorKind::RegexDisabled => write!(f, "RegexDisabled"),
            AnalysisErrorKind::InvalidRegex => write!(f, "InvalidRegex"),
            AnalysisErrorKind::LimitExceeded => write!(f, "LimitExceeded"),
        }
    }
}

/// Types of compile errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The script is invalid; reported to the user
    Analysis(AnalysisErrorKind),
    /// The compiler broke one of its own invariants; never caused by user input
    CodeGen,
}

impl ErrorKind {
    pub fn is_analysis(&self) -> bool {
        matches!(self, ErrorKind::Analysis(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Analysis(kind) => write!(f, "{}", kind),
            ErrorKind::CodeGen => write!(f, "CodeGenError"),
        }
    }
}

/// Main error type for Scorch compilation
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Location,
    pub help: Option<String>,
    source_lines: Vec<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
            help: None,
            source_lines: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach the script text so `format` can show the offending line
    pub fn with_source(mut self, source: &str) -> Self {
        self.source_lines = source.lines().map(String::from).collect();
        self
    }

    /// Analysis sub-kind, if this is a user-facing error
    pub fn analysis_kind(&self) -> Option<AnalysisErrorKind> {
        match self.kind {
            ErrorKind::Analysis(kind) => Some(kind),
            ErrorKind::CodeGen => None,
        }
    }

    /// Format the error for a terminal, with colors and source context
    pub fn format(&self) -> String {
        let mut output = String::new();

        // Header: TypeMismatch: message at line:column
        let header = format!(
            "{}: {} at {}:{}",
            self.kind.to_string().red().bold(),
            self.message.white().bold(),
            self.location.line,
            self.location.column
        );
        output.push_str(&header);
        output.push('\n');

        // Source context: the line before, the error line, the line after
        if !self.source_lines.is_empty() && self.location.line > 0 {
            let error_line = self.location.line;
            let start_line = if error_line > 1 { error_line - 1 } else { 1 };
            let end_line = (error_line + 1).min(self.source_lines.len());

            output.push('\n');

            for line_num in start_line..=end_line {
                let Some(line_content) = self.source_lines.get(line_num - 1) else {
                    continue;
                };
                let line_num_str = format!("{:>4} |", line_num);

                if line_num == error_line {
                    output.push_str(&format!("{} {}\n", line_num_str.red(), line_content));
                    let spaces = " ".repeat(6 + self.location.column);
                    let caret_len = self.location.description.chars().count().max(1);
                    let carets = "^".repeat(caret_len);
                    output.push_str(&format!("{}{}\n", spaces, carets.red().bold()));
                } else {
                    output.push_str(&format!("{} {}\n", line_num_str.dimmed(), line_content));
                }
            }
        } else if !self.location.description.is_empty() {
            output.push_str(&format!("      {} {}\n", "-->".dimmed(), self.location.description));
        }

        if let Some(ref help) = self.help {
            output.push_str(&format!("\n      {}: {}\n", "Help".cyan().bold(), help));
        }

        output
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.kind, self.message, self.location)
    }
}

impl std::error::Error for CompileError {}

/// Result type for Scorch compilation
pub type CompileResult<T> = Result<T, CompileError>;

// Convenience constructors for common errors
impl CompileError {
    pub fn analysis(
        kind: AnalysisErrorKind,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self::new(ErrorKind::Analysis(kind), message, location)
    }

    pub fn unreachable_code(location: Location) -> Self {
        Self::analysis(
            AnalysisErrorKind::UnreachableCode,
            "Unreachable statement",
            location,
        )
    }

    pub fn duplicate_declaration(name: &str, location: Location) -> Self {
        Self::analysis(
            AnalysisErrorKind::DuplicateDeclaration,
            format!("Variable '{}' is already declared in this scope", name),
            location,
        )
    }

    pub fn undeclared_variable(name: &str, location: Location) -> Self {
        Self::analysis(
            AnalysisErrorKind::UndeclaredVariable,
            format!("Variable '{}' is not declared", name),
            location,
        )
    }

    pub fn type_mismatch(message: impl Into<String>, location: Location) -> Self {
        Self::analysis(AnalysisErrorKind::TypeMismatch, message, location)
    }

    pub fn invalid_control_transfer(message: impl Into<String>, location: Location) -> Self {
        Self::analysis(AnalysisErrorKind::InvalidControlTransfer, message, location)
    }

    pub fn limit_exceeded(message: impl Into<String>, location: Location) -> Self {
        Self::analysis(AnalysisErrorKind::LimitExceeded, message, location)
            .with_help("split the script into smaller scripts")
    }

    pub fn codegen(message: impl Into<String>, location: Location) -> Self {
        Self::new(ErrorKind::CodeGen, message, location)
    }
}
