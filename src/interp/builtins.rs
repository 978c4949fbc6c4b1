//! Built-in properties
//!
//! Objects expose their own properties first; arrays, strings and objects
//! also carry a few native methods. Methods receive their receiver as `this`
//! through the binding the evaluator performs on property access.

use super::eval::EvalResult;
use super::value::{Function, Parameter, Value};
use crate::diagnostics::EvalError;

/// Look up `name` on `receiver`
pub fn resolve_property(receiver: &Value, name: &str) -> EvalResult<Value> {
    let builtin = match receiver {
        Value::Object(object) => {
            if let Some(value) = object.get(name) {
                return Ok(value);
            }
            match name {
                "size" => Some(size_method()),
                _ => None,
            }
        }
        Value::Array(_) => match name {
            "size" => Some(size_method()),
            "push" => Some(push_method()),
            _ => None,
        },
        Value::String(_) => match name {
            "size" => Some(size_method()),
            _ => None,
        },
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "object, array or string",
                found: other.type_name(),
            });
        }
    };

    builtin.ok_or_else(|| EvalError::UnknownProperty {
        name: name.to_string(),
        receiver: receiver.type_name(),
    })
}

/// `size()`: element, property or character count
fn size_method() -> Value {
    Value::Function(Function::new(Vec::new(), |_, env| {
        let len = match env.get("this")? {
            Value::Array(array) => array.len(),
            Value::Object(object) => object.len(),
            Value::String(s) => s.chars().count(),
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "object, array or string",
                    found: other.type_name(),
                });
            }
        };
        Ok(Value::Number(len as i64))
    }))
}

/// `push(value)`: append and yield the array
fn push_method() -> Value {
    let params = vec![Parameter {
        name: "value".to_string(),
        mutable: false,
    }];
    Value::Function(Function::new(params, |_, env| {
        let this = env.get("this")?;
        this.to_array()?.push(env.get("value")?);
        Ok(this)
    }))
}
