// ABOUTME: Error types for the lexing, parsing, and evaluation pipeline

use crate::value::{Type, Value};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Lexical error: unterminated literal/comment or an unrecognised character.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct LexError {
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl LexError {
    pub fn new(line: u32, col: u32, message: impl Into<String>) -> Self {
        LexError {
            line,
            col,
            message: message.into(),
        }
    }
}

/// Syntax error. The parser is non-recovering: the first error aborts the parse.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub line: u32,
    pub col: u32,
    pub expected: String,
    pub found: String,
}

impl ParseError {
    pub fn new(line: u32, col: u32, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ParseError {
            line,
            col,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Everything that can go wrong while the tree walker is running.
///
/// The first runtime error aborts the interpretation; the interpreted
/// program never observes an unwind (C has no exceptions).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    // ===== Static-ish errors raised at the point of use =====
    #[error("Redeclaration: '{0}' is already declared in this scope")]
    Redeclaration(String),

    #[error("Undeclared: '{0}' is not declared")]
    Undeclared(String),

    #[error("TypeMismatch: {0}")]
    TypeMismatch(String),

    #[error("NotAFunction: '{0}' is not a function")]
    NotAFunction(String),

    #[error("ArityMismatch: {function} expects {expected} argument{}, got {actual}", if *.expected == 1 { "" } else { "s" })]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    // ===== Runtime proper =====
    #[error("DivisionByZero: division or remainder by zero")]
    DivisionByZero,

    #[error("ShiftOutOfRange: shift count {0} is negative or too large")]
    ShiftOutOfRange(i64),

    #[error("IndexOutOfBounds: index {index} outside [0, {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("NullDereference: null pointer dereferenced")]
    NullDereference,

    #[error("InvalidFree: {0}")]
    InvalidFree(String),

    #[error("DoubleFree: address {0:#x} was already freed")]
    DoubleFree(usize),

    #[error("SegFault: {0}")]
    SegFault(String),

    #[error("InitializerOverflow: {given} initializers for {len} element{}", if *.len == 1 { "" } else { "s" })]
    InitializerOverflow { given: usize, len: usize },

    #[error("StrayControlFlow: stray '{0}' outside its enclosing construct")]
    StrayControlFlow(&'static str),

    #[error("OutOfMemory: heap limit of {limit} bytes exceeded")]
    OutOfMemory { limit: usize },

    #[error("Interrupted: cancelled by the host")]
    Interrupted,
}

/// A runtime error tagged with the source position of the node that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at line {line}, column {col}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: u32,
    pub col: u32,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: u32, col: u32) -> Self {
        RuntimeError { kind, line, col }
    }

    /// Type mismatch with the conventional "expected X, got Y" wording.
    pub fn type_error(expected: &str, actual: &Value, line: u32, col: u32) -> Self {
        RuntimeError::new(
            RuntimeErrorKind::TypeMismatch(format!(
                "expected {}, got {}",
                expected,
                actual.type_name()
            )),
            line,
            col,
        )
    }

    /// Arity mismatch for a named function.
    pub fn arity_error(function: &str, expected: usize, actual: usize, line: u32, col: u32) -> Self {
        RuntimeError::new(
            RuntimeErrorKind::ArityMismatch {
                function: function.to_string(),
                expected,
                actual,
            },
            line,
            col,
        )
    }

    /// Operands of a binary operator that the operator cannot combine.
    pub fn bad_operands(op: &str, lhs: &Type, rhs: &Type, line: u32, col: u32) -> Self {
        RuntimeError::new(
            RuntimeErrorKind::TypeMismatch(format!(
                "invalid operands to '{}' ({} and {})",
                op, lhs, rhs
            )),
            line,
            col,
        )
    }
}

// ============================================================================
// Driver-facing diagnostics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    LexError,
    ParseError,
    RuntimeError,
    LeakWarning,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::LexError => "LexError",
            DiagnosticKind::ParseError => "ParseError",
            DiagnosticKind::RuntimeError => "RuntimeError",
            DiagnosticKind::LeakWarning => "LeakWarning",
        };
        write!(f, "{}", name)
    }
}

/// What the driver sees: one entry per failure (or leak advisory).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at line {}, column {}",
            self.kind, self.message, self.line, self.column
        )
    }
}

impl From<LexError> for Diagnostic {
    fn from(e: LexError) -> Self {
        Diagnostic {
            kind: DiagnosticKind::LexError,
            message: e.message,
            line: e.line,
            column: e.col,
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        Diagnostic {
            kind: DiagnosticKind::ParseError,
            message: format!("expected {}, found {}", e.expected, e.found),
            line: e.line,
            column: e.col,
        }
    }
}

impl From<RuntimeError> for Diagnostic {
    fn from(e: RuntimeError) -> Self {
        Diagnostic {
            kind: DiagnosticKind::RuntimeError,
            message: e.kind.to_string(),
            line: e.line,
            column: e.col,
        }
    }
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.kind != DiagnosticKind::LeakWarning
    }
}
