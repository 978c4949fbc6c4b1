//! Abstract Syntax Tree for the culebra language
//!
//! This module defines the tree produced by the parser and consumed by the
//! evaluator. Every node records its span and the line/column it starts at.

use std::rc::Rc;

use crate::common::{Position, Span};
use serde::{Deserialize, Serialize};

/// A syntax tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub pos: Position,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span, pos: Position) -> Self {
        Self { kind, span, pos }
    }
}

/// Node kinds, one per construct the evaluator dispatches on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // ==================== STATEMENTS ====================
    /// Statement sequence; evaluates to its last statement
    Statements(Vec<Node>),
    /// `while cond { body }`
    While { condition: Box<Node>, body: Box<Node> },
    /// Alternating condition/consequence pairs with an optional trailing else
    If(Vec<Node>),
    /// `mut? name = value`
    Assignment {
        mutable: bool,
        name: String,
        value: Box<Node>,
    },

    // ==================== FUNCTIONS ====================
    /// `fn(params) { body }`
    Function { params: Vec<Param>, body: Rc<Node> },
    /// Primary expression followed by postfix operations
    Call {
        primary: Box<Node>,
        postfix: Vec<Postfix>,
    },

    // ==================== EXPRESSIONS ====================
    LogicalOr(Vec<Node>),
    LogicalAnd(Vec<Node>),
    /// Binary comparison
    Condition {
        lhs: Box<Node>,
        op: CompareOp,
        rhs: Box<Node>,
    },
    UnaryPlus(Box<Node>),
    UnaryMinus(Box<Node>),
    UnaryNot(Box<Node>),
    /// Left-associative arithmetic fold: `first (op operand)*`
    Arithmetic {
        first: Box<Node>,
        rest: Vec<(ArithOp, Node)>,
    },

    // ==================== PRIMARIES ====================
    Identifier(String),
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
    /// Number literal text, converted at evaluation time
    Number(String),
    Boolean(bool),
    /// Literal and embedded-expression segments of a double-quoted string
    InterpolatedString(Vec<Node>),
    /// Literal text segment inside an interpolated string
    Text(String),
}

/// Formal parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub mutable: bool,
}

/// One step of a postfix chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postfix {
    pub kind: PostfixKind,
    pub span: Span,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PostfixKind {
    /// `(args...)`
    Arguments(Vec<Node>),
    /// `[expr]`
    Index(Box<Node>),
    /// `.name`
    Dot(String),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Additive and multiplicative operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}
