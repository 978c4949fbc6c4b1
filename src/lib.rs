//! Culebra: a small dynamically typed scripting language
//!
//! Programs are sequences of expressions over numbers, booleans, strings,
//! arrays, objects and first-class closures.
//!
//! # Architecture
//!
//! ```text
//! Source → Lexer → Parser → AST → Interpreter → Value
//! ```
//!
//! # Example
//!
//! ```text
//! counter = fn() {
//!     mut n = 0
//!     fn() { n = n + 1 }
//! }()
//! counter()
//! puts("count: ${counter()}")
//! ```

pub mod ast;
pub mod common;
pub mod diagnostics;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod stack;

// Re-export diagnostics for convenience
pub use diagnostics::{EvalError, ParseError, RunError, SourceFile};

// Re-exports for convenience
pub use ast::Node;
pub use interp::{Env, Environment, Interpreter, Value, prelude};
pub use parser::Parser;

/// Interpreter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse `source` with `parser` and evaluate it in `env`.
///
/// `path` only labels parse errors. Bindings made by the program stay in
/// `env`, so successive runs against one environment share state.
pub fn run(parser: &Parser, path: &str, env: &Env, source: &str) -> Result<Value, RunError> {
    run_with(&mut Interpreter::new(), parser, path, env, source)
}

/// [`run`] with a caller-configured interpreter
pub fn run_with(
    interpreter: &mut Interpreter,
    parser: &Parser,
    path: &str,
    env: &Env,
    source: &str,
) -> Result<Value, RunError> {
    let program = parser
        .parse(source)
        .map_err(|e| RunError::parse(&SourceFile::new(path, source), e))?;
    Ok(interpreter.interpret(&program, env)?)
}

/// Interpret source code directly in a fresh root environment
pub fn interpret(source: &str) -> Result<Value, RunError> {
    let env = Environment::new();
    prelude::install_stdout(&env);
    run(&Parser::new(), "<input>", &env, source)
}
