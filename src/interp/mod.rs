//! Tree-walking interpreter for the AST
//!
//! Evaluates parsed programs directly against shared, mutable environments.

pub mod builtins;
pub mod env;
pub mod eval;
pub mod prelude;
pub mod value;

pub use env::{Env, Environment};
pub use eval::{DEFAULT_MAX_DEPTH, EvalResult, Interpreter};
pub use prelude::Output;
pub use value::{Array, Function, Object, Value};
