//! Parser for the culebra language
//!
//! A recursive descent parser that produces a [`Node`] tree from a token
//! stream. Precedence, loosest first: assignment, `||`, `&&`, comparison,
//! additive, unary `+`/`-`/`!`, multiplicative, postfix chain, primary.

use std::rc::Rc;

use crate::ast::*;
use crate::common::{LineIndex, Position, Span};
use crate::diagnostics::ParseError;
use crate::lexer::{self, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;

/// Default limit on expression nesting
pub const DEFAULT_MAX_NESTING: usize = 512;

/// Parse a token stream into a statement sequence
pub fn parse(tokens: &[Token], source: &str) -> Result<Node, ParseError> {
    let index = LineIndex::new(source);
    ParserState::new(tokens, source, &index, DEFAULT_MAX_NESTING).parse_program()
}

/// Parser configuration.
///
/// Constructed by the caller and handed to [`crate::run`]; holds no state
/// between parses.
#[derive(Debug, Clone)]
pub struct Parser {
    max_nesting: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    /// Reject programs whose expressions nest deeper than `limit`
    pub fn with_max_nesting(mut self, limit: usize) -> Self {
        self.max_nesting = limit;
        self
    }

    /// Lex and parse a complete source text
    pub fn parse(&self, source: &str) -> Result<Node, ParseError> {
        let index = LineIndex::new(source);
        let tokens = lexer::lex_range(source, 0..source.len(), &index)?;
        tracing::debug!("Lexed {} tokens", tokens.len());
        ParserState::new(&tokens, source, &index, self.max_nesting).parse_program()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parser state
struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
    index: &'a LineIndex,
    depth: usize,
    max_nesting: usize,
}

impl<'a> ParserState<'a> {
    fn new(
        tokens: &'a [Token],
        source: &'a str,
        index: &'a LineIndex,
        max_nesting: usize,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            index,
            depth: 0,
            max_nesting,
        }
    }

    fn current(&self) -> Token {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(tok) => tok.clone(),
            None => Token {
                kind: TokenKind::Eof,
                span: Span::default(),
                pos: Position { line: 1, column: 1 },
                text: String::new(),
            },
        }
    }

    fn previous(&self) -> Token {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(tok) => tok.clone(),
            None => self.current(),
        }
    }

    fn peek(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn peek_n(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    /// True when the current token sits on the same line as the previous one
    fn on_same_line(&self) -> bool {
        self.pos > 0 && self.current().pos.line == self.previous().pos.line
    }

    fn advance(&mut self) -> Token {
        let tok = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("'{}'", kind)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        let found = match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", tok.text),
        };
        ParseError::new(
            format!("expected {}, found {}", expected, found),
            tok.pos,
            tok.span,
        )
    }

    /// Span from `start` through the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(self.previous().span)
    }

    // ==================== PROGRAM ====================

    fn parse_program(&mut self) -> Result<Node, ParseError> {
        let program = self.parse_statements(TokenKind::Eof)?;
        self.expect(TokenKind::Eof)?;
        Ok(program)
    }

    fn parse_statements(&mut self, terminator: TokenKind) -> Result<Node, ParseError> {
        let start = self.current();
        let mut statements = Vec::new();

        loop {
            while self.at(TokenKind::Semi) {
                self.advance();
            }
            if self.at(terminator) || self.at(TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_expression()?);
        }

        let span = if statements.is_empty() {
            Span::new(start.span.start, start.span.start)
        } else {
            self.span_from(start.span)
        };
        Ok(Node::new(NodeKind::Statements(statements), span, start.pos))
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let block = self.parse_statements(TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace)?;
        Ok(block)
    }

    // ==================== EXPRESSIONS ====================

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        if self.depth >= self.max_nesting {
            let tok = self.current();
            return Err(ParseError::new(
                "expression nested too deeply",
                tok.pos,
                tok.span,
            ));
        }

        self.depth += 1;
        let result = ensure_sufficient_stack(|| {
            let is_assignment = self.at(TokenKind::Mut)
                || (self.at(TokenKind::Ident) && self.peek_n(1) == TokenKind::Eq);
            if is_assignment {
                self.parse_assignment()
            } else {
                self.parse_logical_or()
            }
        });
        self.depth -= 1;
        result
    }

    fn parse_assignment(&mut self) -> Result<Node, ParseError> {
        let start = self.current();
        let mutable = if self.at(TokenKind::Mut) {
            self.advance();
            true
        } else {
            false
        };

        let name = self.expect(TokenKind::Ident)?.text;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expression()?;

        Ok(Node::new(
            NodeKind::Assignment {
                mutable,
                name,
                value: Box::new(value),
            },
            self.span_from(start.span),
            start.pos,
        ))
    }

    fn parse_logical_or(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_logical_and()?;
        if !self.at(TokenKind::PipePipe) {
            return Ok(first);
        }

        let (span, pos) = (first.span, first.pos);
        let mut operands = vec![first];
        while self.at(TokenKind::PipePipe) {
            self.advance();
            operands.push(self.parse_logical_and()?);
        }
        Ok(Node::new(
            NodeKind::LogicalOr(operands),
            self.span_from(span),
            pos,
        ))
    }

    fn parse_logical_and(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_condition()?;
        if !self.at(TokenKind::AmpAmp) {
            return Ok(first);
        }

        let (span, pos) = (first.span, first.pos);
        let mut operands = vec![first];
        while self.at(TokenKind::AmpAmp) {
            self.advance();
            operands.push(self.parse_condition()?);
        }
        Ok(Node::new(
            NodeKind::LogicalAnd(operands),
            self.span_from(span),
            pos,
        ))
    }

    fn parse_condition(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;

        let (span, pos) = (lhs.span, lhs.pos);
        Ok(Node::new(
            NodeKind::Condition {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            },
            self.span_from(span),
            pos,
        ))
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_unary_plus()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.peek() {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_unary_plus()?));
        }

        Ok(self.fold_arithmetic(first, rest))
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ParseError> {
        let first = self.parse_call()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.peek() {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Rem,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_call()?));
        }

        Ok(self.fold_arithmetic(first, rest))
    }

    fn fold_arithmetic(&self, first: Node, rest: Vec<(ArithOp, Node)>) -> Node {
        if rest.is_empty() {
            return first;
        }
        let (span, pos) = (first.span, first.pos);
        Node::new(
            NodeKind::Arithmetic {
                first: Box::new(first),
                rest,
            },
            self.span_from(span),
            pos,
        )
    }

    fn parse_unary_plus(&mut self) -> Result<Node, ParseError> {
        if !self.at(TokenKind::Plus) {
            return self.parse_unary_minus();
        }
        let op = self.advance();
        let operand = self.parse_unary_minus()?;
        Ok(Node::new(
            NodeKind::UnaryPlus(Box::new(operand)),
            self.span_from(op.span),
            op.pos,
        ))
    }

    fn parse_unary_minus(&mut self) -> Result<Node, ParseError> {
        if !self.at(TokenKind::Minus) {
            return self.parse_unary_not();
        }
        let op = self.advance();
        let operand = self.parse_unary_not()?;
        Ok(Node::new(
            NodeKind::UnaryMinus(Box::new(operand)),
            self.span_from(op.span),
            op.pos,
        ))
    }

    fn parse_unary_not(&mut self) -> Result<Node, ParseError> {
        if !self.at(TokenKind::Bang) {
            return self.parse_multiplicative();
        }
        let op = self.advance();
        let operand = self.parse_multiplicative()?;
        Ok(Node::new(
            NodeKind::UnaryNot(Box::new(operand)),
            self.span_from(op.span),
            op.pos,
        ))
    }

    // ==================== POSTFIX CHAIN ====================

    fn parse_call(&mut self) -> Result<Node, ParseError> {
        let primary = self.parse_primary()?;
        let mut postfix = Vec::new();

        loop {
            let start = self.current();
            let kind = match self.peek() {
                // A paren or bracket opening a new line starts a new statement
                TokenKind::LParen if self.on_same_line() => {
                    PostfixKind::Arguments(self.parse_arguments()?)
                }
                TokenKind::LBracket if self.on_same_line() => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    PostfixKind::Index(Box::new(index))
                }
                TokenKind::Dot => {
                    self.advance();
                    PostfixKind::Dot(self.expect(TokenKind::Ident)?.text)
                }
                _ => break,
            };
            postfix.push(Postfix {
                kind,
                span: self.span_from(start.span),
                pos: start.pos,
            });
        }

        if postfix.is_empty() {
            return Ok(primary);
        }
        let (span, pos) = (primary.span, primary.pos);
        Ok(Node::new(
            NodeKind::Call {
                primary: Box::new(primary),
                postfix,
            },
            self.span_from(span),
            pos,
        ))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();

        while !self.at(TokenKind::RParen) {
            args.push(self.parse_expression()?);
            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    // ==================== PRIMARIES ====================

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let start = self.current();
        let kind = match start.kind {
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                NodeKind::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::Fn => self.parse_function()?,
            TokenKind::LBrace => self.parse_object()?,
            TokenKind::LBracket => self.parse_array()?,
            TokenKind::True | TokenKind::False => {
                self.advance();
                NodeKind::Boolean(start.kind == TokenKind::True)
            }
            TokenKind::IntLit => {
                self.advance();
                NodeKind::Number(start.text.clone())
            }
            TokenKind::Ident => {
                self.advance();
                NodeKind::Identifier(start.text.clone())
            }
            TokenKind::StringLit => {
                self.advance();
                NodeKind::InterpolatedString(self.parse_string_segments(&start)?)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("expression")),
        };

        Ok(Node::new(kind, self.span_from(start.span), start.pos))
    }

    fn parse_if(&mut self) -> Result<NodeKind, ParseError> {
        self.expect(TokenKind::If)?;
        let mut branches = vec![self.parse_expression()?, self.parse_block()?];

        while self.at(TokenKind::Else) {
            self.advance();
            if self.at(TokenKind::If) {
                self.advance();
                branches.push(self.parse_expression()?);
                branches.push(self.parse_block()?);
            } else {
                branches.push(self.parse_block()?);
                break;
            }
        }

        Ok(NodeKind::If(branches))
    }

    fn parse_function(&mut self) -> Result<NodeKind, ParseError> {
        self.expect(TokenKind::Fn)?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();

        while !self.at(TokenKind::RParen) {
            let mutable = if self.at(TokenKind::Mut) {
                self.advance();
                true
            } else {
                false
            };
            let name = self.expect(TokenKind::Ident)?.text;
            params.push(Param { name, mutable });
            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(NodeKind::Function {
            params,
            body: Rc::new(body),
        })
    }

    fn parse_object(&mut self) -> Result<NodeKind, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut properties = Vec::new();

        while !self.at(TokenKind::RBrace) {
            let name = self.expect(TokenKind::Ident)?.text;
            self.expect(TokenKind::Colon)?;
            properties.push((name, self.parse_expression()?));
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(NodeKind::Object(properties))
    }

    fn parse_array(&mut self) -> Result<NodeKind, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut elements = Vec::new();

        while !self.at(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.at(TokenKind::RBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::RBracket)?;
        Ok(NodeKind::Array(elements))
    }

    // ==================== STRINGS ====================

    /// Split a string token into text and `${...}` expression segments
    fn parse_string_segments(&mut self, token: &Token) -> Result<Vec<Node>, ParseError> {
        let source: &'a str = self.source;
        let start = token.span.start + 1;
        let end = token.span.end - 1;
        let bytes = source.as_bytes();
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut text_start = start;
        let mut chars = source[start..end].char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                }
                '$' if matches!(chars.peek(), Some((_, '{'))) => {
                    let open = start + offset;
                    self.push_text(&mut segments, &mut text, text_start, open);

                    let close = lexer::scan_embedded(bytes, open + 2)
                        .filter(|&close| close <= end)
                        .ok_or_else(|| {
                            ParseError::new(
                                "unterminated '${' in string",
                                self.index.position(open),
                                Span::new(open, end),
                            )
                        })?;
                    segments.push(self.parse_embedded(open + 2..close - 1)?);

                    while matches!(chars.peek(), Some(&(o, _)) if start + o < close) {
                        chars.next();
                    }
                    text_start = close;
                }
                _ => text.push(c),
            }
        }
        self.push_text(&mut segments, &mut text, text_start, end);

        Ok(segments)
    }

    fn push_text(&self, segments: &mut Vec<Node>, text: &mut String, start: usize, end: usize) {
        if text.is_empty() {
            return;
        }
        segments.push(Node::new(
            NodeKind::Text(std::mem::take(text)),
            Span::new(start, end),
            self.index.position(start),
        ));
    }

    fn parse_embedded(&mut self, range: std::ops::Range<usize>) -> Result<Node, ParseError> {
        let tokens = lexer::lex_range(self.source, range, self.index)?;
        let mut inner = ParserState::new(&tokens, self.source, self.index, self.max_nesting);
        inner.depth = self.depth;
        let expr = inner.parse_expression()?;
        inner.expect(TokenKind::Eof)?;
        Ok(expr)
    }
}
