//! Lispet - an embeddable Scheme-subset bytecode compiler and virtual machine
//!
//! Lispet compiles abstract syntax trees of a small Lisp-family language to
//! bytecode and executes it on a stack-based VM with proper tail calls and
//! first-class, multi-shot continuations. There is no textual parser: hosts
//! build programs from [`Expr`] nodes directly.
//!
//! # Features
//!
//! - **Tail-position analysis**: the compiler marks every call that sits in
//!   tail position, and the VM runs tail loops at constant frame depth
//! - **First-class continuations**: `call-with-current-continuation`
//!   captures the frame chain; captured continuations are multi-shot
//! - **Interned symbols**: symbol equality is handle identity
//! - **Captured output**: `display`/`newline` write to a buffer the host
//!   drains, never straight to stdout
//! - **Resource limits**: optional instruction budget per evaluation
//! - **Reloadable bytecode** (feature `serde`): compiled programs freeze to
//!   a JSON artifact with symbols by name and thaw into any runtime
//!
//! # Quick Start
//!
//! ```
//! use lispet::{Expr, Program, Runtime, Value};
//!
//! let mut rt = Runtime::new();
//!
//! // (define factorial (lambda (n) (if (= n 0) 1 (* n (factorial (- n 1))))))
//! // (factorial 5)
//! let program = Program::new(Expr::sequence(vec![
//!     Expr::define(
//!         "factorial",
//!         Expr::lambda(
//!             &["n"],
//!             Expr::if_(
//!                 Expr::invoke(vec![
//!                     Expr::symbol("="),
//!                     Expr::symbol("n"),
//!                     Expr::int(0),
//!                 ]),
//!                 Expr::int(1),
//!                 Expr::invoke(vec![
//!                     Expr::symbol("*"),
//!                     Expr::symbol("n"),
//!                     Expr::invoke(vec![
//!                         Expr::symbol("factorial"),
//!                         Expr::invoke(vec![
//!                             Expr::symbol("-"),
//!                             Expr::symbol("n"),
//!                             Expr::int(1),
//!                         ]),
//!                     ]),
//!                 ]),
//!             ),
//!         ),
//!     ),
//!     Expr::invoke(vec![Expr::symbol("factorial"), Expr::int(5)]),
//! ]));
//!
//! assert_eq!(rt.run(&program).unwrap(), Value::Int(120));
//! ```
//!
//! # Semantics worth knowing
//!
//! - Only `#t` is truthy. Nil, `#f`, `0`, and the empty string are all
//!   falsy in `if`.
//! - Looking up an unbound symbol yields Nil rather than an error; `set` of
//!   an unbound symbol is an error.
//! - Arithmetic is checked 64-bit integer arithmetic: overflow and division
//!   by zero fail.
//! - Errors are fatal to the running program and carry the index of the
//!   instruction that raised them.

pub mod ast;
mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod env;
pub mod error;
pub mod intern;
pub mod runtime;
pub mod value;
pub mod vm;

#[cfg(feature = "serde")]
pub mod transpile;

pub use ast::{Expr, Literal, Program};
pub use bytecode::{Code, Constant, Instruction};
pub use error::{Error, Result};
pub use intern::{Interner, Symbol};
pub use runtime::{Limits, Runtime};
pub use value::Value;
pub use vm::{Frame, FrameRef, Vm};
