//! Runtime value representation.
//!
//! A value is a closed tagged union, one variant per type the language
//! knows about. Compound values (pairs, vectors) and environments are
//! shared behind `Rc<RefCell<…>>`: mutating a pair's field is visible
//! through every handle to it, and never changes its identity.
//!
//! Equality follows the same split: scalars compare by payload, reference
//! variants compare by identity. There is no numeric coercion anywhere.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::Code;
use crate::env::EnvRef;
use crate::error::Result;
use crate::intern::{Interner, Symbol};
use crate::vm::{FrameRef, Vm};

/// A host-implemented primitive.
///
/// The callable receives the VM, the frame that issued the call (with its
/// pc already advanced past the invoke), and a fresh environment holding
/// the arguments. It must push exactly one value onto the frame it returns;
/// for ordinary primitives that is the calling frame itself.
pub type NativeFn = Rc<dyn Fn(&mut Vm, FrameRef, EnvRef) -> Result<FrameRef>>;

/// A mutable cons cell.
#[derive(Debug, Clone)]
pub struct Pair {
    pub first: Value,
    pub second: Value,
}

/// A closure: compiled body plus the environment it was created in.
///
/// The environment is captured by reference; mutations made through the
/// defining scope after capture are visible to the closure.
#[derive(Clone)]
pub struct Lambda {
    pub params: Vec<Symbol>,
    pub body: Code,
    pub env: EnvRef,
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lambda/{})", self.params.len())
    }
}

/// A built-in primitive function.
#[derive(Clone)]
pub struct Native {
    pub name: Rc<str>,
    pub params: Vec<Symbol>,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(nativefn {})", self.name)
    }
}

/// A reified continuation: a snapshot of the frame chain at capture time.
///
/// The snapshot is never executed directly; each application materialises a
/// fresh copy of it, which is what makes continuations multi-shot.
#[derive(Clone)]
pub struct Continuation {
    pub frame: FrameRef,
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(continuation)")
    }
}

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Symbol(Symbol),
    Pair(Rc<RefCell<Pair>>),
    Vector(Rc<RefCell<Vec<Value>>>),
    Lambda(Rc<Lambda>),
    Native(Rc<Native>),
    Continuation(Rc<Continuation>),
}

impl Value {
    /// Build a fresh pair with both fields Nil.
    pub fn pair() -> Value {
        Value::Pair(Rc::new(RefCell::new(Pair {
            first: Value::Nil,
            second: Value::Nil,
        })))
    }

    /// Build a vector of `len` slots, all initialised to Nil.
    pub fn vector(len: usize) -> Value {
        Value::Vector(Rc::new(RefCell::new(vec![Value::Nil; len])))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Vector(_) => "vector",
            Value::Lambda(_) => "lambda",
            Value::Native(_) => "nativefn",
            Value::Continuation(_) => "continuation",
        }
    }

    /// Exactly `Bool(true)` is truthy. Nil, `Bool(false)`, zero, the empty
    /// string, pairs: all falsy. This is narrower than Scheme and is
    /// observable in `if` and `jumpiffalse`.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Render the value for `display`.
    ///
    /// Needs the interner to turn symbol handles back into names. Strings
    /// render as their raw contents.
    pub fn render(&self, interner: &Interner) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(true) => "#t".to_string(),
            Value::Bool(false) => "#f".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Symbol(sym) => interner.name(*sym).to_string(),
            Value::Pair(p) => {
                let p = p.borrow();
                format!(
                    "({} . {})",
                    p.first.render(interner),
                    p.second.render(interner)
                )
            }
            Value::Vector(v) => {
                let items: Vec<String> =
                    v.borrow().iter().map(|item| item.render(interner)).collect();
                format!("#({})", items.join(" "))
            }
            Value::Lambda(_) => "(lambda)".to_string(),
            Value::Native(n) => format!("(nativefn {})", n.name),
            Value::Continuation(_) => "(continuation)".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Continuation(a), Value::Continuation(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_true_is_truthy() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Int(1).is_truthy());
        assert!(!Value::Str(Rc::from("")).is_truthy());
        assert!(!Value::pair().is_truthy());
    }

    #[test]
    fn scalars_compare_by_payload() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Int(4));
        assert_eq!(Value::Str(Rc::from("a")), Value::Str(Rc::from("a")));
        // no coercion across variants
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }

    #[test]
    fn pairs_compare_by_identity() {
        let a = Value::pair();
        let b = Value::pair();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn pair_mutation_preserves_identity() {
        let a = Value::pair();
        let alias = a.clone();
        if let Value::Pair(p) = &a {
            p.borrow_mut().first = Value::Int(42);
        }
        assert_eq!(a, alias);
        if let Value::Pair(p) = &alias {
            assert_eq!(p.borrow().first, Value::Int(42));
        }
    }

    #[test]
    fn vectors_initialise_to_nil() {
        if let Value::Vector(v) = Value::vector(3) {
            assert_eq!(v.borrow().len(), 3);
            assert!(v.borrow().iter().all(|item| *item == Value::Nil));
        } else {
            unreachable!();
        }
    }

    #[test]
    fn render_scalars() {
        let mut interner = Interner::new();
        let done = interner.intern("done");
        assert_eq!(Value::Nil.render(&interner), "nil");
        assert_eq!(Value::Bool(true).render(&interner), "#t");
        assert_eq!(Value::Int(-7).render(&interner), "-7");
        assert_eq!(Value::Symbol(done).render(&interner), "done");
        assert_eq!(Value::Str(Rc::from("hi")).render(&interner), "hi");
    }
}
