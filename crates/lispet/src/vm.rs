//! Stack-based bytecode virtual machine.
//!
//! The VM executes instruction sequences produced by the compiler. It is the
//! only module that mutates runtime state; the compiler is pure translation
//! and the builtins are stateless apart from the output buffer.
//!
//! Execution is organised around frames. A frame is one activation record:
//! the bytecode being run, a program counter, an operand stack, a local
//! environment, and a link to the frame to return to. The dispatch loop
//! holds exactly one *current* frame; calls, returns, and continuation
//! application replace it. Tail calls splice the new frame onto the caller's
//! return link instead of the caller itself, which is what keeps a
//! self-recursive tail loop at constant frame depth.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};

use crate::bytecode::{Code, Instruction};
use crate::env::{EnvRef, Environment};
use crate::error::{Error, Result};
use crate::intern::{Interner, Symbol};
use crate::value::{Lambda, Native, NativeFn, Value};

/// Shared handle to a frame.
///
/// Frames are shared in two ways: the outer link of every callee aliases
/// its caller, and continuations hold snapshots of whole chains.
pub type FrameRef = Rc<RefCell<Frame>>;

/// A VM activation record.
pub struct Frame {
    /// The bytecode this frame is executing.
    pub code: Code,
    /// Index of the next instruction to execute.
    pub pc: usize,
    /// The frame's local environment (fresh per call; its outer scope is
    /// the closure's captured environment).
    pub env: EnvRef,
    /// Operand stack for temporaries.
    pub stack: Vec<Value>,
    /// The frame to resume on `return`. None only for a top-level frame.
    pub outer: Option<FrameRef>,
    /// Length of the outer chain, maintained so the VM can report the
    /// maximum depth reached without walking links.
    depth: usize,
}

impl Frame {
    /// Create a frame at pc 0 with an empty operand stack.
    pub fn new(code: Code, env: EnvRef, outer: Option<FrameRef>) -> FrameRef {
        let depth = match &outer {
            Some(outer) => outer.borrow().depth + 1,
            None => 1,
        };
        Rc::new(RefCell::new(Frame {
            code,
            pc: 0,
            env,
            stack: Vec::new(),
            outer,
            depth,
        }))
    }

    /// The number of frames on this frame's chain, itself included.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::MalformedBytecode("operand stack underflow".to_string()))
    }

    /// Snapshot a frame chain for a continuation.
    ///
    /// The pc and operand stack of every frame on the chain are copied;
    /// environments and bytecode stay shared, so a restarted continuation
    /// observes live bindings but never the stack of the frames it left
    /// behind. The snapshot itself is never executed: each application
    /// takes a fresh copy of it, which is what makes continuations
    /// multi-shot.
    pub fn snapshot(frame: &FrameRef) -> FrameRef {
        let f = frame.borrow();
        Rc::new(RefCell::new(Frame {
            code: f.code.clone(),
            pc: f.pc,
            env: f.env.clone(),
            stack: f.stack.clone(),
            outer: f.outer.as_ref().map(Frame::snapshot),
            depth: f.depth,
        }))
    }
}

/// What the dispatch of one instruction decided.
enum Flow {
    /// Keep running with this frame (possibly a different one).
    Continue(FrameRef),
    /// A `halt` was executed; this is the program result.
    Halt(Value),
}

/// The virtual machine.
///
/// Owns the symbol table, the global environment, and the output buffer
/// written by `display`/`newline`. A single `Vm` is meant to be reused
/// across evaluations: global bindings persist, the instruction counter
/// and depth statistic reset per evaluation.
pub struct Vm {
    interner: Interner,
    globals: EnvRef,
    output: String,
    instruction_limit: Option<u64>,
    instruction_count: u64,
    max_frame_depth: usize,
}

impl Vm {
    /// Create a VM with an empty global environment. Primitives are not
    /// installed here; see [`crate::builtins::install`].
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            globals: Environment::root(),
            output: String::new(),
            instruction_limit: None,
            instruction_count: 0,
            max_frame_depth: 0,
        }
    }

    /// Intern a symbol name. Idempotent.
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    /// Handle to the global environment.
    pub fn globals(&self) -> EnvRef {
        self.globals.clone()
    }

    /// Seed the global environment.
    pub fn global_define(&mut self, sym: Symbol, value: Value) {
        self.globals.borrow_mut().define(sym, value);
    }

    /// Register a primitive in the global environment.
    pub fn define_native<F>(&mut self, name: &str, params: Vec<Symbol>, func: F)
    where
        F: Fn(&mut Vm, FrameRef, EnvRef) -> Result<FrameRef> + 'static,
    {
        let sym = self.interner.intern(name);
        let native = Native {
            name: Rc::from(name),
            params,
            func: Rc::new(func) as NativeFn,
        };
        self.globals
            .borrow_mut()
            .define(sym, Value::Native(Rc::new(native)));
    }

    /// Cap the number of instructions a single evaluation may execute.
    /// `None` removes the cap.
    pub fn set_instruction_limit(&mut self, limit: Option<u64>) {
        self.instruction_limit = limit;
    }

    /// Append to the output buffer. Used by `display` and `newline`.
    pub fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Take and clear everything written by `display`/`newline` so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Render a value the way `display` would print it.
    pub fn render(&self, value: &Value) -> String {
        value.render(&self.interner)
    }

    /// The deepest frame chain reached during the last evaluation.
    pub fn max_frame_depth(&self) -> usize {
        self.max_frame_depth
    }

    /// Drive the dispatch loop until `halt`.
    ///
    /// Returns the value left on top of the final frame's stack. The
    /// instruction counter and the depth statistic reset at entry.
    pub fn evaluate(&mut self, frame: FrameRef) -> Result<Value> {
        self.instruction_count = 0;
        self.max_frame_depth = frame.borrow().depth;
        let mut current = frame;
        loop {
            let pc = current.borrow().pc;
            let instr = {
                let f = current.borrow();
                match f.code.get(f.pc) {
                    Some(instr) => instr.clone(),
                    None => {
                        return Err(Error::MalformedBytecode(
                            "program counter ran past the end of the bytecode".to_string(),
                        )
                        .at(f.pc));
                    }
                }
            };

            self.instruction_count += 1;
            if let Some(limit) = self.instruction_limit
                && self.instruction_count > limit
            {
                return Err(Error::InstructionLimitExceeded(limit));
            }

            trace!("pc {:>4}  {:?}", pc, instr);

            match self.dispatch(instr, &current).map_err(|e| e.at(pc))? {
                Flow::Continue(next) => {
                    let depth = next.borrow().depth;
                    if depth > self.max_frame_depth {
                        self.max_frame_depth = depth;
                    }
                    current = next;
                }
                Flow::Halt(value) => return Ok(value),
            }
        }
    }

    /// Execute a compiled program in the given environment.
    ///
    /// The program frame is linked to a bootstrap frame holding a single
    /// `halt`. A program normally terminates at its own `halt`, but a
    /// program whose final act is a tail call hands its return destination
    /// to the callee; the bootstrap frame is that destination, so the
    /// callee's `return` still lands on a `halt` and the returned value
    /// becomes the program result.
    pub fn execute(&mut self, code: Code, env: EnvRef) -> Result<Value> {
        let root = Frame::new(vec![Instruction::Halt].into(), env.clone(), None);
        let frame = Frame::new(code, env, Some(root));
        self.evaluate(frame)
    }

    /// Evaluate a module and promote its top-level bindings.
    ///
    /// The module runs in a fresh child of the global environment; once it
    /// halts successfully, every binding it created there is copied into
    /// the global environment. Nothing is promoted if evaluation fails.
    pub fn import(&mut self, code: Code) -> Result<()> {
        let env = Environment::child(&self.globals);
        self.execute(code, env.clone())?;
        let bindings = env.borrow().local_bindings();
        debug!(
            "importing {} binding(s) into the global environment",
            bindings.len()
        );
        let mut globals = self.globals.borrow_mut();
        for (sym, value) in bindings {
            globals.define(sym, value);
        }
        Ok(())
    }

    fn dispatch(&mut self, instr: Instruction, frame: &FrameRef) -> Result<Flow> {
        match instr {
            Instruction::Literal(constant) => {
                let mut f = frame.borrow_mut();
                f.push(constant.to_value());
                f.pc += 1;
            }

            Instruction::Load(sym) => {
                let env = frame.borrow().env.clone();
                let value = env.borrow().lookup(sym);
                let mut f = frame.borrow_mut();
                f.push(value);
                f.pc += 1;
            }

            Instruction::Define(sym) => {
                let value = frame.borrow_mut().pop()?;
                let env = frame.borrow().env.clone();
                env.borrow_mut().define(sym, value);
                let mut f = frame.borrow_mut();
                f.push(Value::Nil);
                f.pc += 1;
            }

            Instruction::Set(sym) => {
                let value = frame.borrow_mut().pop()?;
                let env = frame.borrow().env.clone();
                if !env.borrow_mut().set(sym, value) {
                    return Err(Error::UnboundSet(self.interner.name(sym).to_string()));
                }
                let mut f = frame.borrow_mut();
                f.push(Value::Nil);
                f.pc += 1;
            }

            Instruction::Pop => {
                let mut f = frame.borrow_mut();
                f.pop()?;
                f.pc += 1;
            }

            Instruction::Jump(offset) => {
                let mut f = frame.borrow_mut();
                let target = f.pc + offset;
                if target > f.code.len() {
                    return Err(Error::MalformedBytecode(format!(
                        "jump target {target} is out of range"
                    )));
                }
                f.pc = target;
            }

            Instruction::JumpIfFalse(offset) => {
                let mut f = frame.borrow_mut();
                let value = f.pop()?;
                if value.is_truthy() {
                    f.pc += 1;
                } else {
                    let target = f.pc + offset;
                    if target > f.code.len() {
                        return Err(Error::MalformedBytecode(format!(
                            "jump target {target} is out of range"
                        )));
                    }
                    f.pc = target;
                }
            }

            Instruction::Lambda(lc) => {
                let env = frame.borrow().env.clone();
                let lambda = Value::Lambda(Rc::new(Lambda {
                    params: lc.params.clone(),
                    body: lc.body.clone(),
                    env,
                }));
                let mut f = frame.borrow_mut();
                f.push(lambda);
                f.pc += 1;
            }

            Instruction::Invoke(n) => {
                return Ok(Flow::Continue(self.invoke(frame, n, false)?));
            }

            Instruction::InvokeTail(n) => {
                return Ok(Flow::Continue(self.invoke(frame, n, true)?));
            }

            Instruction::Return => {
                let value = frame.borrow_mut().pop()?;
                let outer = frame.borrow().outer.clone().ok_or_else(|| {
                    Error::MalformedBytecode("return with no calling frame".to_string())
                })?;
                outer.borrow_mut().push(value);
                return Ok(Flow::Continue(outer));
            }

            Instruction::Halt => {
                let value = frame.borrow_mut().stack.pop().unwrap_or(Value::Nil);
                return Ok(Flow::Halt(value));
            }
        }
        Ok(Flow::Continue(frame.clone()))
    }

    /// The call protocol shared by `invoke` and `invoketail`.
    ///
    /// Pops `n - 1` arguments (last argument on top) and the callee below
    /// them, then dispatches on the callee's variant. A non-tail call
    /// suspends the current frame as the return destination; a tail call
    /// hands the current frame's own destination to the callee and drops
    /// the current frame, leaving the chain depth unchanged.
    fn invoke(&mut self, frame: &FrameRef, n: usize, tail: bool) -> Result<FrameRef> {
        if n == 0 {
            return Err(Error::MalformedBytecode(
                "invoke with no callee".to_string(),
            ));
        }

        let (callee, args, return_to) = {
            let mut f = frame.borrow_mut();
            f.pc += 1;
            let mut args = vec![Value::Nil; n - 1];
            for slot in args.iter_mut().rev() {
                *slot = f.pop()?;
            }
            let callee = f.pop()?;
            let return_to = if tail {
                f.outer.clone()
            } else {
                Some(frame.clone())
            };
            (callee, args, return_to)
        };

        match callee {
            Value::Lambda(lambda) => {
                if lambda.params.len() != args.len() {
                    return Err(Error::ArityMismatch {
                        callee: "lambda".to_string(),
                        expected: lambda.params.len(),
                        got: args.len(),
                    });
                }
                let env = Environment::child(&lambda.env);
                {
                    let mut scope = env.borrow_mut();
                    for (param, arg) in lambda.params.iter().zip(args) {
                        scope.define(*param, arg);
                    }
                }
                Ok(Frame::new(lambda.body.clone(), env, return_to))
            }

            Value::Native(native) => {
                if native.params.len() != args.len() {
                    return Err(Error::ArityMismatch {
                        callee: native.name.to_string(),
                        expected: native.params.len(),
                        got: args.len(),
                    });
                }
                // Arguments live in a fresh scope directly under the global
                // environment; primitives do not see the caller's scope.
                let env = Environment::child(&self.globals);
                {
                    let mut scope = env.borrow_mut();
                    for (param, arg) in native.params.iter().zip(args) {
                        scope.define(*param, arg);
                    }
                }
                let func = native.func.clone();
                func(self, frame.clone(), env)
            }

            Value::Continuation(k) => {
                if args.len() != 1 {
                    return Err(Error::ArityMismatch {
                        callee: "continuation".to_string(),
                        expected: 1,
                        got: args.len(),
                    });
                }
                // Materialise a fresh copy of the captured chain so the
                // continuation stays applicable, and deliver the argument
                // as the value the original call/cc returns with.
                let restored = Frame::snapshot(&k.frame);
                let arg = args.into_iter().next().unwrap();
                restored.borrow_mut().push(arg);
                Ok(restored)
            }

            other => Err(Error::Type {
                expected: "a callable value".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
