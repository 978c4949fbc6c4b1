//! Runtime values for the interpreter

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::env::Env;
use super::eval::{EvalResult, Interpreter};
use crate::ast::{ArithOp, CompareOp, Param};
use crate::diagnostics::EvalError;
use crate::stack::ensure_sufficient_stack;

/// Declared function parameter
pub type Parameter = Param;

/// Runtime value
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Unit,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer, wrapping on overflow
    Number(i64),
    /// Immutable string
    String(Rc<str>),
    /// Shared, mutable sequence
    Array(Array),
    /// Shared, mutable property map
    Object(Object),
    /// Closure or built-in
    Function(Function),
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    fn mismatch(&self, expected: &'static str) -> EvalError {
        EvalError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn to_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("boolean")),
        }
    }

    pub fn to_number(&self) -> EvalResult<i64> {
        match self {
            Value::Number(n) => Ok(*n),
            _ => Err(self.mismatch("number")),
        }
    }

    pub fn to_str(&self) -> EvalResult<Rc<str>> {
        match self {
            Value::String(s) => Ok(Rc::clone(s)),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn to_array(&self) -> EvalResult<Array> {
        match self {
            Value::Array(a) => Ok(a.clone()),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn to_object(&self) -> EvalResult<Object> {
        match self {
            Value::Object(o) => Ok(o.clone()),
            _ => Err(self.mismatch("object")),
        }
    }

    pub fn to_function(&self) -> EvalResult<Function> {
        match self {
            Value::Function(f) => Ok(f.clone()),
            _ => Err(self.mismatch("function")),
        }
    }

    /// `==` as the language defines it: same kind required, containers
    /// and functions compare by identity
    pub fn equals(&self, other: &Value) -> EvalResult<bool> {
        Ok(match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => return Err(other.mismatch(self.type_name())),
        })
    }

    fn ordering(&self, other: &Value) -> EvalResult<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ if std::mem::discriminant(self) == std::mem::discriminant(other) => {
                Err(self.mismatch("number, string or boolean"))
            }
            _ => Err(other.mismatch(self.type_name())),
        }
    }

    /// Apply a comparison operator
    pub fn compare(&self, op: CompareOp, other: &Value) -> EvalResult<bool> {
        match op {
            CompareOp::Eq => self.equals(other),
            CompareOp::Ne => self.equals(other).map(|eq| !eq),
            CompareOp::Lt => Ok(self.ordering(other)? == Ordering::Less),
            CompareOp::Le => Ok(self.ordering(other)? != Ordering::Greater),
            CompareOp::Gt => Ok(self.ordering(other)? == Ordering::Greater),
            CompareOp::Ge => Ok(self.ordering(other)? != Ordering::Less),
        }
    }
}

/// Integer arithmetic with wraparound; division and remainder by zero fail
pub fn arithmetic(op: ArithOp, lhs: i64, rhs: i64) -> EvalResult<i64> {
    match op {
        ArithOp::Add => Ok(lhs.wrapping_add(rhs)),
        ArithOp::Sub => Ok(lhs.wrapping_sub(rhs)),
        ArithOp::Mul => Ok(lhs.wrapping_mul(rhs)),
        ArithOp::Div if rhs == 0 => Err(EvalError::DivisionByZero),
        ArithOp::Div => Ok(lhs.wrapping_div(rhs)),
        ArithOp::Rem if rhs == 0 => Err(EvalError::DivisionByZero),
        ArithOp::Rem => Ok(lhs.wrapping_rem(rhs)),
    }
}

// ==================== CONTAINERS ====================

/// Array handle; clones alias the same storage
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn new(values: Vec<Value>) -> Self {
        Array(Rc::new(RefCell::new(values)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Object handle; clones alias the same property map
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Insert or overwrite a property
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// Dropping the last handle to a container releases its descendants through
// a work list, so a deeply nested chain does not recurse once per level.

impl Array {
    /// Move the elements out if this is the last handle
    fn release_into(&self, pending: &mut Vec<Value>) {
        if Rc::strong_count(&self.0) == 1 {
            if let Ok(mut items) = self.0.try_borrow_mut() {
                pending.append(&mut items);
            }
        }
    }
}

impl Object {
    /// Move the property values out if this is the last handle
    fn release_into(&self, pending: &mut Vec<Value>) {
        if Rc::strong_count(&self.0) == 1 {
            if let Ok(mut props) = self.0.try_borrow_mut() {
                pending.extend(props.drain(..).map(|(_, v)| v));
            }
        }
    }
}

fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match &value {
            Value::Array(arr) => arr.release_into(&mut pending),
            Value::Object(obj) => obj.release_into(&mut pending),
            _ => {}
        }
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        release(pending);
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        release(pending);
    }
}

// ==================== FUNCTIONS ====================

type Callable = dyn Fn(&mut Interpreter, &Env) -> EvalResult<Value>;

struct FunctionData {
    params: Vec<Parameter>,
    body: Box<Callable>,
}

/// Callable value: declared parameters plus the behavior run against a
/// prepared call environment
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

impl Function {
    pub fn new(
        params: Vec<Parameter>,
        body: impl Fn(&mut Interpreter, &Env) -> EvalResult<Value> + 'static,
    ) -> Self {
        Function(Rc::new(FunctionData {
            params,
            body: Box::new(body),
        }))
    }

    pub fn params(&self) -> &[Parameter] {
        &self.0.params
    }

    /// Run the body in `env`, which the caller has already populated
    pub fn invoke(&self, interp: &mut Interpreter, env: &Env) -> EvalResult<Value> {
        (self.0.body)(interp, env)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ==================== CONVERSIONS ====================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(Array::new(values))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

// ==================== FORMATTING ====================

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Parameter]) -> fmt::Result {
    write!(f, "<fn(")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if p.mutable {
            write!(f, "mut ")?;
        }
        write!(f, "{}", p.name)?;
    }
    write!(f, ")>")
}

/// Containers currently being written, so a container reached again through
/// its own elements is printed as a placeholder
type Open = Vec<*const ()>;

impl Value {
    fn render(&self, f: &mut fmt::Formatter<'_>, open: &mut Open, quoted: bool) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) if quoted => write!(f, "{:?}", s),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(arr) => {
                let id = Rc::as_ptr(&arr.0).cast::<()>();
                if open.contains(&id) {
                    return write!(f, "[...]");
                }
                open.push(id);
                let result = render_array(arr, f, open);
                open.pop();
                result
            }
            Value::Object(obj) => {
                let id = Rc::as_ptr(&obj.0).cast::<()>();
                if open.contains(&id) {
                    return write!(f, "{{...}}");
                }
                open.push(id);
                let result = render_object(obj, f, open);
                open.pop();
                result
            }
            Value::Function(func) => write_params(f, func.params()),
        }
    }
}

fn render_array(arr: &Array, f: &mut fmt::Formatter<'_>, open: &mut Open) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in arr.0.borrow().iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        ensure_sufficient_stack(|| v.render(f, open, true))?;
    }
    write!(f, "]")
}

fn render_object(obj: &Object, f: &mut fmt::Formatter<'_>, open: &mut Open) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in obj.0.borrow().iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: ", k)?;
        ensure_sufficient_stack(|| v.render(f, open, true))?;
    }
    write!(f, "}}")
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Open::new(), true)
    }
}

/// The language's `str()` conversion
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Open::new(), false)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.clone()))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.clone()))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_params(f, self.params())
    }
}
