//! Lexical environments
//!
//! An environment owns its bindings and links to any number of outer
//! environments, searched in order on a miss. Function values keep their
//! defining environment alive through an `Rc`, which is how closures outlive
//! the call that created them.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::eval::EvalResult;
use super::value::{Object, Value};
use crate::diagnostics::EvalError;

/// Shared handle to an environment
pub type Env = Rc<Environment>;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// A single scope
#[derive(Default)]
pub struct Environment {
    bindings: RefCell<FxHashMap<String, Binding>>,
    outers: RefCell<Vec<Env>>,
    /// Receiver whose properties resolve as names inside a method body
    object: RefCell<Option<Object>>,
}

impl Environment {
    /// Create an empty root environment
    pub fn new() -> Env {
        Rc::new(Self::default())
    }

    /// True if `name` resolves anywhere in the chain
    pub fn has(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
            || self.object.borrow().as_ref().is_some_and(|o| o.contains(name))
            || self.outers.borrow().iter().any(|outer| outer.has(name))
    }

    /// Resolve `name`: own bindings, then the receiver, then outers in order
    pub fn get(&self, name: &str) -> EvalResult<Value> {
        self.lookup(name).ok_or_else(|| EvalError::UnboundName {
            name: name.to_string(),
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        if let Some(value) = self.object.borrow().as_ref().and_then(|o| o.get(name)) {
            return Some(value);
        }
        self.outers.borrow().iter().find_map(|outer| outer.lookup(name))
    }

    /// Create a binding in this scope, shadowing outer ones
    pub fn initialize(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.into(), Binding { value, mutable });
    }

    /// Overwrite the nearest existing binding of `name`
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<()> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(EvalError::ImmutableBinding {
                    name: name.to_string(),
                });
            }
            binding.value = value;
            return Ok(());
        }

        if let Some(object) = self.object.borrow().as_ref() {
            if object.contains(name) {
                object.set(name, value);
                return Ok(());
            }
        }

        let owner = self
            .outers
            .borrow()
            .iter()
            .find(|outer| outer.has(name))
            .cloned();
        match owner {
            Some(outer) => outer.assign(name, value),
            None => Err(EvalError::UnboundName {
                name: name.to_string(),
            }),
        }
    }

    /// Search `other` after the outers already installed
    pub fn append_outer(&self, other: Env) {
        self.outers.borrow_mut().push(other);
    }

    /// Attach a method receiver
    pub fn set_object(&self, object: Object) {
        *self.object.borrow_mut() = Some(object);
    }
}
