//! Global functions available to every program

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use super::env::Env;
use super::value::{Function, Parameter, Value};
use crate::diagnostics::EvalError;

/// Sink that `puts` writes to
pub type Output = Rc<RefCell<dyn Write>>;

/// Define `puts` and `assert` in `env`, with `puts` writing to `out`
pub fn install(env: &Env, out: Output) {
    env.initialize("puts", puts(out), false);
    env.initialize("assert", assert(), false);
    tracing::trace!("prelude installed");
}

/// [`install`] with standard output as the sink
pub fn install_stdout(env: &Env) {
    let out: Output = Rc::new(RefCell::new(io::stdout()));
    install(env, out);
}

fn param(name: &str) -> Vec<Parameter> {
    vec![Parameter {
        name: name.to_string(),
        mutable: false,
    }]
}

fn puts(out: Output) -> Value {
    Value::Function(Function::new(param("value"), move |_, env| {
        let value = env.get("value")?;
        let mut out = out.borrow_mut();
        writeln!(out, "{value}")
            .and_then(|()| out.flush())
            .map_err(|e| EvalError::Output {
                message: e.to_string(),
            })?;
        Ok(Value::Unit)
    }))
}

fn assert() -> Value {
    Value::Function(Function::new(param("condition"), |_, env| {
        if env.get("condition")?.to_bool()? {
            return Ok(Value::Unit);
        }
        Err(EvalError::AssertionFailed {
            line: env.get("__LINE__")?.to_number()?,
            column: env.get("__COLUMN__")?.to_number()?,
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::env::Environment;
    use crate::interp::eval::Interpreter;

    fn capture() -> (Env, Rc<RefCell<Vec<u8>>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let env = Environment::new();
        install(&env, buffer.clone());
        (env, buffer)
    }

    #[test]
    fn test_puts_writes_line() {
        let (env, buffer) = capture();
        let call_env = Environment::new();
        call_env.initialize("value", Value::from("hi"), false);

        let puts = env.get("puts").unwrap().to_function().unwrap();
        let result = puts.invoke(&mut Interpreter::new(), &call_env).unwrap();

        assert_eq!(result, Value::Unit);
        assert_eq!(buffer.borrow().as_slice(), b"hi\n");
    }

    #[test]
    fn test_assert_reports_call_site() {
        let (env, _) = capture();
        let call_env = Environment::new();
        call_env.initialize("condition", Value::Bool(false), false);
        call_env.initialize("__LINE__", Value::Number(3), false);
        call_env.initialize("__COLUMN__", Value::Number(7), false);

        let assert = env.get("assert").unwrap().to_function().unwrap();
        let err = assert
            .invoke(&mut Interpreter::new(), &call_env)
            .unwrap_err();
        assert_eq!(err, EvalError::AssertionFailed { line: 3, column: 7 });
    }
}
