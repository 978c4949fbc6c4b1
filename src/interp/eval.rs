//! Tree-walking evaluator
//!
//! Dispatch is structural: one arm per [`NodeKind`], each recursing into its
//! children with the same environment unless a call creates a new one.

use std::rc::Rc;

use crate::ast::*;
use crate::common::Position;
use crate::diagnostics::EvalError;
use crate::stack::ensure_sufficient_stack;

use super::builtins;
use super::env::{Env, Environment};
use super::value::{Array, Function, Object, Value, arithmetic};

/// Result of evaluating anything
pub type EvalResult<T> = Result<T, EvalError>;

/// Default limit on nested evaluation frames
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// Tree-walking interpreter
pub struct Interpreter {
    /// Current number of nested `eval` frames
    depth: usize,
    /// Frames allowed before failing with `StackOverflow`
    max_depth: usize,
}

impl Interpreter {
    /// Create a new interpreter
    pub fn new() -> Self {
        Interpreter {
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Evaluate a whole program in `env`
    pub fn interpret(&mut self, program: &Node, env: &Env) -> EvalResult<Value> {
        tracing::debug!(max_depth = self.max_depth, "evaluating program");
        let result = self.eval(program, env);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "evaluation failed");
        }
        result
    }

    /// Evaluate a node
    pub fn eval(&mut self, node: &Node, env: &Env) -> EvalResult<Value> {
        if self.depth >= self.max_depth {
            return Err(EvalError::StackOverflow {
                limit: self.max_depth,
            });
        }

        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.dispatch(node, env));
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, node: &Node, env: &Env) -> EvalResult<Value> {
        match &node.kind {
            NodeKind::Statements(statements) => self.eval_statements(statements, env),
            NodeKind::While { condition, body } => self.eval_while(condition, body, env),
            NodeKind::If(branches) => self.eval_if(branches, env),
            NodeKind::Assignment {
                mutable,
                name,
                value,
            } => self.eval_assignment(*mutable, name, value, env),
            NodeKind::Function { params, body } => Ok(self.eval_function(params, body, env)),
            NodeKind::Call { primary, postfix } => self.eval_call(node.pos, primary, postfix, env),
            NodeKind::LogicalOr(operands) => self.eval_logical(operands, true, env),
            NodeKind::LogicalAnd(operands) => self.eval_logical(operands, false, env),
            NodeKind::Condition { lhs, op, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                Ok(Value::Bool(lhs.compare(*op, &rhs)?))
            }
            NodeKind::UnaryPlus(operand) => {
                let value = self.eval(operand, env)?;
                value.to_number()?;
                Ok(value)
            }
            NodeKind::UnaryMinus(operand) => {
                let n = self.eval(operand, env)?.to_number()?;
                Ok(Value::Number(n.wrapping_neg()))
            }
            NodeKind::UnaryNot(operand) => {
                let b = self.eval(operand, env)?.to_bool()?;
                Ok(Value::Bool(!b))
            }
            NodeKind::Arithmetic { first, rest } => {
                let mut acc = self.eval(first, env)?.to_number()?;
                for (op, operand) in rest {
                    let rhs = self.eval(operand, env)?.to_number()?;
                    acc = arithmetic(*op, acc, rhs)?;
                }
                Ok(Value::Number(acc))
            }
            NodeKind::Identifier(name) => env.get(name),
            NodeKind::Object(properties) => {
                let object = Object::new();
                for (name, expr) in properties {
                    let value = self.eval(expr, env)?;
                    object.set(name.as_str(), value);
                }
                Ok(Value::Object(object))
            }
            NodeKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for expr in elements {
                    values.push(self.eval(expr, env)?);
                }
                Ok(Value::Array(Array::new(values)))
            }
            NodeKind::Number(text) => text
                .parse::<i64>()
                .map(Value::Number)
                .map_err(|_| EvalError::InvalidNumber { text: text.clone() }),
            NodeKind::Boolean(b) => Ok(Value::Bool(*b)),
            NodeKind::InterpolatedString(segments) => {
                let mut s = String::new();
                for segment in segments {
                    let value = self.eval(segment, env)?;
                    s.push_str(&value.to_string());
                }
                Ok(Value::from(s))
            }
            NodeKind::Text(text) => Ok(Value::from(text.as_str())),
        }
    }

    // ==================== STATEMENTS ====================

    fn eval_statements(&mut self, statements: &[Node], env: &Env) -> EvalResult<Value> {
        let mut result = Value::Unit;
        for statement in statements {
            result = self.eval(statement, env)?;
        }
        Ok(result)
    }

    fn eval_while(&mut self, condition: &Node, body: &Node, env: &Env) -> EvalResult<Value> {
        while self.eval(condition, env)?.to_bool()? {
            self.eval(body, env)?;
        }
        Ok(Value::Unit)
    }

    fn eval_if(&mut self, branches: &[Node], env: &Env) -> EvalResult<Value> {
        for pair in branches.chunks(2) {
            match pair {
                [condition, consequence] => {
                    if self.eval(condition, env)?.to_bool()? {
                        return self.eval(consequence, env);
                    }
                }
                [otherwise] => return self.eval(otherwise, env),
                _ => {}
            }
        }
        Ok(Value::Unit)
    }

    fn eval_assignment(
        &mut self,
        mutable: bool,
        name: &str,
        value: &Node,
        env: &Env,
    ) -> EvalResult<Value> {
        let value = self.eval(value, env)?;
        if env.has(name) {
            env.assign(name, value.clone())?;
        } else {
            env.initialize(name, value.clone(), mutable);
        }
        Ok(value)
    }

    // ==================== EXPRESSIONS ====================

    fn eval_logical(&mut self, operands: &[Node], is_or: bool, env: &Env) -> EvalResult<Value> {
        let mut result = Value::Unit;
        for operand in operands {
            result = self.eval(operand, env)?;
            // `||` stops at the first true operand, `&&` at the first false one
            if result.to_bool()? == is_or {
                return Ok(result);
            }
        }
        Ok(result)
    }

    // ==================== FUNCTIONS ====================

    fn eval_function(&mut self, params: &[Param], body: &Rc<Node>, env: &Env) -> Value {
        let body = Rc::clone(body);
        let defining = Rc::clone(env);
        Value::Function(Function::new(params.to_vec(), move |interp, call_env| {
            call_env.append_outer(Rc::clone(&defining));
            interp.eval(&body, call_env)
        }))
    }

    fn eval_call(
        &mut self,
        pos: Position,
        primary: &Node,
        postfix: &[Postfix],
        env: &Env,
    ) -> EvalResult<Value> {
        let mut value = self.eval(primary, env)?;

        for step in postfix {
            value = match &step.kind {
                PostfixKind::Arguments(args) => self.call(&value, args, pos, env)?,
                PostfixKind::Index(index) => {
                    let array = value.to_array()?;
                    let index = self.eval(index, env)?.to_number()?;
                    // Out-of-range leaves the running value untouched
                    match usize::try_from(index).ok().and_then(|i| array.get(i)) {
                        Some(element) => element,
                        None => value,
                    }
                }
                PostfixKind::Dot(name) => match builtins::resolve_property(&value, name)? {
                    Value::Function(method) => Value::Function(bind_method(value, method)),
                    property => property,
                },
            };
        }

        Ok(value)
    }

    /// Invoke `callee` with argument expressions evaluated in `env`.
    ///
    /// Arguments beyond the declared parameters are never evaluated.
    fn call(
        &mut self,
        callee: &Value,
        args: &[Node],
        pos: Position,
        env: &Env,
    ) -> EvalResult<Value> {
        let func = callee.to_function()?;
        let params = func.params();
        if args.len() < params.len() {
            return Err(EvalError::ArgumentError {
                expected: params.len(),
                found: args.len(),
                line: pos.line,
                column: pos.column,
            });
        }

        let call_env = Environment::new();
        call_env.initialize("self", callee.clone(), false);
        for (param, arg) in params.iter().zip(args) {
            let value = self.eval(arg, env)?;
            call_env.initialize(param.name.as_str(), value, param.mutable);
        }
        call_env.initialize("__LINE__", Value::Number(pos.line as i64), false);
        call_env.initialize("__COLUMN__", Value::Number(pos.column as i64), false);

        tracing::trace!(line = pos.line, column = pos.column, arity = params.len(), "call");
        func.invoke(self, &call_env)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap `method` so each call sees `receiver` as `this`
fn bind_method(receiver: Value, method: Function) -> Function {
    Function::new(method.params().to_vec(), move |interp, call_env| {
        call_env.initialize("this", receiver.clone(), false);
        if let Value::Object(object) = &receiver {
            call_env.set_object(object.clone());
        }
        method.invoke(interp, call_env)
    })
}
