//! Lexically scoped environments.
//!
//! An environment is a symbol-to-value map plus a pointer to its enclosing
//! scope; the global environment has none. Environments are shared: a frame
//! shares its local environment with every closure created inside it, and a
//! closure shares its captured environment with the scope that created it.
//! Hence the `Rc<RefCell<…>>` chain.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::intern::Symbol;
use crate::value::Value;

/// Shared handle to an environment.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One scope in the environment chain.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<Symbol, Value>,
    outer: Option<EnvRef>,
}

impl Environment {
    /// Create a root environment with no enclosing scope.
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Create a scope enclosed by `outer`.
    pub fn child(outer: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            bindings: HashMap::new(),
            outer: Some(outer.clone()),
        }))
    }

    /// Bind `sym` in this scope, shadowing any outer binding.
    pub fn define(&mut self, sym: Symbol, value: Value) {
        self.bindings.insert(sym, value);
    }

    /// Look `sym` up, walking outward. Returns Nil on a miss; lookup never
    /// fails.
    pub fn lookup(&self, sym: Symbol) -> Value {
        if let Some(value) = self.bindings.get(&sym) {
            return value.clone();
        }
        match &self.outer {
            Some(outer) => outer.borrow().lookup(sym),
            None => Value::Nil,
        }
    }

    /// Overwrite `sym` in the innermost scope that already binds it.
    /// Returns false if no scope on the chain does.
    pub fn set(&mut self, sym: Symbol, value: Value) -> bool {
        if let Some(slot) = self.bindings.get_mut(&sym) {
            *slot = value;
            return true;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().set(sym, value),
            None => false,
        }
    }

    /// The bindings of this scope only, ignoring the chain. Used to promote
    /// a module's definitions into the global environment.
    pub fn local_bindings(&self) -> Vec<(Symbol, Value)> {
        self.bindings
            .iter()
            .map(|(sym, value)| (*sym, value.clone()))
            .collect()
    }
}
