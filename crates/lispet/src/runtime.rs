//! The embedding facade.
//!
//! [`Runtime`] bundles a VM with the primitive set installed and exposes
//! the operations a host needs: intern symbols, seed globals, compile and
//! run programs, import modules, and drain the output buffer.
//!
//! # Example
//!
//! ```
//! use lispet::{Expr, Program, Runtime, Value};
//!
//! let mut rt = Runtime::new();
//! let program = Program::new(Expr::invoke(vec![
//!     Expr::symbol("+"),
//!     Expr::int(2),
//!     Expr::int(3),
//! ]));
//! assert_eq!(rt.run(&program).unwrap(), Value::Int(5));
//! ```

use crate::ast::Program;
use crate::builtins;
use crate::bytecode::Code;
use crate::compiler::Compiler;
use crate::env::Environment;
use crate::error::Result;
use crate::intern::Symbol;
use crate::value::Value;
use crate::vm::{FrameRef, Vm};

/// Resource limits for an evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Maximum number of instructions a single evaluation may execute.
    /// `None` means unlimited.
    pub max_instructions: Option<u64>,
}

/// A ready-to-use language runtime: VM plus primitives.
pub struct Runtime {
    vm: Vm,
}

impl Runtime {
    /// Create a runtime with the built-in primitives installed.
    pub fn new() -> Self {
        let mut vm = Vm::new();
        builtins::install(&mut vm);
        Self { vm }
    }

    /// Intern a symbol name. Idempotent.
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.vm.intern(name)
    }

    /// Seed the global environment with a binding.
    pub fn global_define(&mut self, sym: Symbol, value: Value) {
        self.vm.global_define(sym, value);
    }

    /// Compile a program to bytecode without running it.
    pub fn compile(&mut self, program: &Program) -> Result<Code> {
        Compiler::new(self.vm.interner_mut()).compile(program)
    }

    /// Compile and run a program.
    ///
    /// The program runs in a fresh child of the global environment, so its
    /// top-level definitions do not outlive the call; use [`import`] for a
    /// module whose definitions should persist.
    ///
    /// [`import`]: Runtime::import
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        let code = self.compile(program)?;
        let env = Environment::child(&self.vm.globals());
        self.vm.execute(code, env)
    }

    /// Drive the dispatch loop on a caller-constructed frame.
    pub fn evaluate(&mut self, frame: FrameRef) -> Result<Value> {
        self.vm.evaluate(frame)
    }

    /// Evaluate compiled bytecode as a module and promote its top-level
    /// bindings into the global environment. Nothing is promoted if the
    /// module fails.
    pub fn import(&mut self, code: Code) -> Result<()> {
        self.vm.import(code)
    }

    /// Render a value the way `display` would print it.
    pub fn render(&self, value: &Value) -> String {
        self.vm.render(value)
    }

    /// Take and clear everything `display`/`newline` wrote so far.
    ///
    /// ```
    /// use lispet::{Expr, Program, Runtime};
    ///
    /// let mut rt = Runtime::new();
    /// let program = Program::new(Expr::sequence(vec![
    ///     Expr::invoke(vec![Expr::symbol("display"), Expr::int(42)]),
    ///     Expr::invoke(vec![Expr::symbol("newline")]),
    /// ]));
    /// rt.run(&program).unwrap();
    /// assert_eq!(rt.take_output(), "42\n");
    /// ```
    pub fn take_output(&mut self) -> String {
        self.vm.take_output()
    }

    /// Apply resource limits to subsequent evaluations.
    pub fn limit(&mut self, limits: Limits) {
        self.vm.set_instruction_limit(limits.max_instructions);
    }

    /// The deepest frame chain reached during the last evaluation. Tail
    /// calls do not deepen it; this is how the tail-call guarantee is
    /// observed from outside.
    pub fn max_frame_depth(&self) -> usize {
        self.vm.max_frame_depth()
    }

    /// Direct access to the underlying VM.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
