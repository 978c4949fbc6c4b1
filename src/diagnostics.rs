//! Diagnostic reporting with source locations
//!
//! Parse failures carry a span so the CLI can render them with miette;
//! evaluation failures are plain kinds with a description.

use crate::common::{Position, Span};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use thiserror::Error;

/// Source file for error reporting
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Arc::from(content.into()),
        }
    }

    pub fn to_named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.content.to_string())
    }
}

/// Convert our Span to miette's SourceSpan
impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// Malformed source, reported with its position
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("{message}")]
#[diagnostic(code(parse::syntax))]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Position, span: Span) -> Self {
        Self {
            message: message.into(),
            line: pos.line,
            column: pos.column,
            span,
        }
    }
}

/// Run-time failure kinds
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(eval::type_mismatch))]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("undefined variable '{name}'")]
    #[diagnostic(code(eval::unbound_name))]
    UnboundName { name: String },

    #[error("immutable variable '{name}'")]
    #[diagnostic(
        code(eval::immutable_binding),
        help("declare the variable with `mut` to allow reassignment")
    )]
    ImmutableBinding { name: String },

    #[error("arguments error: expected at least {expected}, got {found} at {line}:{column}")]
    #[diagnostic(code(eval::arguments))]
    ArgumentError {
        expected: usize,
        found: usize,
        line: usize,
        column: usize,
    },

    #[error("division by zero")]
    #[diagnostic(code(eval::division_by_zero))]
    DivisionByZero,

    #[error("stack overflow: evaluation nested deeper than {limit} levels")]
    #[diagnostic(code(eval::stack_overflow))]
    StackOverflow { limit: usize },

    #[error("undefined property '{name}' on {receiver}")]
    #[diagnostic(code(eval::unknown_property))]
    UnknownProperty {
        name: String,
        receiver: &'static str,
    },

    #[error("invalid number literal '{text}'")]
    #[diagnostic(code(eval::invalid_number))]
    InvalidNumber { text: String },

    #[error("assert failed at {line}:{column}")]
    #[diagnostic(code(eval::assert))]
    AssertionFailed { line: i64, column: i64 },

    #[error("output error: {message}")]
    #[diagnostic(code(eval::output))]
    Output { message: String },
}

/// Failure of a complete parse-then-evaluate run
#[derive(Error, Debug, Diagnostic)]
pub enum RunError {
    #[error("{path}:{line}:{column}: {message}")]
    #[diagnostic(code(parse::syntax))]
    Parse {
        path: String,
        line: usize,
        column: usize,
        message: String,
        #[label("{message}")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

impl RunError {
    /// Attach the source file to a parse failure
    pub fn parse(source: &SourceFile, error: ParseError) -> Self {
        RunError::Parse {
            path: source.name.clone(),
            line: error.line,
            column: error.column,
            message: error.message,
            span: error.span.into(),
            src: source.to_named_source(),
        }
    }

    /// The evaluation failure, if this run got past parsing
    pub fn as_eval(&self) -> Option<&EvalError> {
        match self {
            RunError::Eval(e) => Some(e),
            RunError::Parse { .. } => None,
        }
    }
}
