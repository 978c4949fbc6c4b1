//! Lexer for culebra source text
//!
//! Token recognition is generated by logos; this module attaches spans and
//! line/column positions and terminates the stream with an `Eof` token.

mod tokens;

pub use tokens::{Token, TokenKind};
pub(crate) use tokens::{scan_embedded, scan_string};

use std::ops::Range;

use logos::Logos;

use crate::common::{LineIndex, Span};
use crate::diagnostics::ParseError;

/// Tokenize a complete source text
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let index = LineIndex::new(source);
    lex_range(source, 0..source.len(), &index)
}

/// Tokenize `source[range]`, reporting spans relative to the whole source.
///
/// Used for the expressions embedded in interpolated strings.
pub(crate) fn lex_range(
    source: &str,
    range: Range<usize>,
    index: &LineIndex,
) -> Result<Vec<Token>, ParseError> {
    let base = range.start;
    let end = range.end;
    let mut lexer = TokenKind::lexer(&source[range]);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let local = lexer.span();
        let span = Span::new(base + local.start, base + local.end);
        let pos = index.position(span.start);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span,
                pos,
                text: lexer.slice().to_string(),
            }),
            Err(()) => {
                let message = if lexer.slice().starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    format!("unexpected character '{}'", lexer.slice())
                };
                return Err(ParseError::new(message, pos, span));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
        pos: index.position(end),
        text: String::new(),
    });
    Ok(tokens)
}
