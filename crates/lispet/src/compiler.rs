//! Bytecode compiler: translates ASTs to instruction sequences.
//!
//! The compiler is pure translation; it holds no runtime state beyond a
//! borrow of the interner. It walks the tree exactly once, threading a
//! single `in_tail` flag down, and that flag alone decides whether an
//! application compiles to `Invoke` or `InvokeTail`.
//!
//! Tail position is syntactic: the program body is in tail position, the
//! last expression of a sequence and both arms of an `if` inherit it, a
//! lambda body is always in tail position, and every other child position
//! resets it. The VM exploits the distinction at run time to keep
//! self-recursive tail loops at constant frame depth.

use std::rc::Rc;

use crate::ast::{Expr, Literal, Program};
use crate::bytecode::{Code, Constant, Instruction, LambdaCode};
use crate::error::Result;
use crate::intern::Interner;

/// Compiles ASTs into bytecode, interning symbol names as it goes.
pub struct Compiler<'a> {
    interner: &'a mut Interner,
}

impl<'a> Compiler<'a> {
    pub fn new(interner: &'a mut Interner) -> Self {
        Self { interner }
    }

    /// Compile a whole program. The body is compiled in tail position and
    /// the stream is terminated with `Halt`.
    pub fn compile(&mut self, program: &Program) -> Result<Code> {
        let mut out = Vec::new();
        self.compile_expr(&program.body, true, &mut out)?;
        out.push(Instruction::Halt);
        Ok(out.into())
    }

    fn compile_expr(&mut self, expr: &Expr, in_tail: bool, out: &mut Vec<Instruction>) -> Result<()> {
        match expr {
            Expr::Literal(lit) => {
                let constant = self.constant(lit);
                out.push(Instruction::Literal(constant));
            }

            Expr::Symbol(name) => {
                let sym = self.interner.intern(name);
                out.push(Instruction::Load(sym));
            }

            Expr::Sequence(exprs) => {
                // An empty sequence still has to leave one operand behind.
                if exprs.is_empty() {
                    out.push(Instruction::Literal(Constant::Nil));
                    return Ok(());
                }
                let last = exprs.len() - 1;
                for (i, expr) in exprs.iter().enumerate() {
                    if i < last {
                        // Intermediate expressions are never in tail position
                        // and their values are discarded.
                        self.compile_expr(expr, false, out)?;
                        out.push(Instruction::Pop);
                    } else {
                        // The last expression is in tail position only if the
                        // whole sequence is.
                        self.compile_expr(expr, in_tail, out)?;
                    }
                }
            }

            Expr::Define { name, value } => {
                self.compile_expr(value, false, out)?;
                let sym = self.interner.intern(name);
                out.push(Instruction::Define(sym));
            }

            Expr::Set { name, value } => {
                self.compile_expr(value, false, out)?;
                let sym = self.interner.intern(name);
                out.push(Instruction::Set(sym));
            }

            Expr::If {
                test,
                then,
                otherwise,
            } => {
                // Layout:
                //   <test> jumpiffalse(len(then)+1) <then> jump(len(else)+1) <else>
                // The +1 accounts for the jump instruction itself: the false
                // branch lands on the first instruction of <else>, and the
                // true branch's trailing jump lands one past the end of it.
                self.compile_expr(test, false, out)?;
                let mut then_code = Vec::new();
                self.compile_expr(then, in_tail, &mut then_code)?;
                let mut else_code = Vec::new();
                self.compile_expr(otherwise, in_tail, &mut else_code)?;
                then_code.push(Instruction::Jump(else_code.len() + 1));
                out.push(Instruction::JumpIfFalse(then_code.len() + 1));
                out.extend(then_code);
                out.extend(else_code);
            }

            Expr::Lambda { params, body } => {
                // The body is the lambda's only expression, so it is always
                // in tail position, and it always ends with a return.
                let mut body_code = Vec::new();
                self.compile_expr(body, true, &mut body_code)?;
                body_code.push(Instruction::Return);
                let params = params.iter().map(|p| self.interner.intern(p)).collect();
                out.push(Instruction::Lambda(Rc::new(LambdaCode {
                    params,
                    body: body_code.into(),
                })));
            }

            Expr::Invoke(exprs) => {
                // Callee and arguments are operands of the call, never in
                // tail position themselves.
                for expr in exprs {
                    self.compile_expr(expr, false, out)?;
                }
                let n = exprs.len();
                if in_tail {
                    out.push(Instruction::InvokeTail(n));
                } else {
                    out.push(Instruction::Invoke(n));
                }
            }
        }
        Ok(())
    }

    fn constant(&mut self, lit: &Literal) -> Constant {
        match lit {
            Literal::Nil => Constant::Nil,
            Literal::Bool(b) => Constant::Bool(*b),
            Literal::Int(n) => Constant::Int(*n),
            Literal::Str(s) => Constant::Str(Rc::from(s.as_str())),
            Literal::Symbol(name) => Constant::Symbol(self.interner.intern(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(body: Expr) -> (Code, Interner) {
        let mut interner = Interner::new();
        let code = Compiler::new(&mut interner)
            .compile(&Program::new(body))
            .unwrap();
        (code, interner)
    }

    #[test]
    fn program_ends_with_halt() {
        let (code, _) = compile(Expr::int(1));
        assert_eq!(
            code.as_ref(),
            &[Instruction::Literal(Constant::Int(1)), Instruction::Halt]
        );
    }

    #[test]
    fn application_compiles_callee_then_args() {
        let (code, mut interner) = compile(Expr::invoke(vec![
            Expr::symbol("+"),
            Expr::int(2),
            Expr::int(3),
        ]));
        let plus = interner.intern("+");
        assert_eq!(
            code.as_ref(),
            &[
                Instruction::Load(plus),
                Instruction::Literal(Constant::Int(2)),
                Instruction::Literal(Constant::Int(3)),
                Instruction::InvokeTail(3),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn if_layout_and_offsets() {
        let (code, mut interner) = compile(Expr::if_(
            Expr::symbol("t"),
            Expr::int(10),
            Expr::int(20),
        ));
        let t = interner.intern("t");
        // False branch must land exactly on the else block; the then
        // branch's jump must land exactly one past its end.
        assert_eq!(
            code.as_ref(),
            &[
                Instruction::Load(t),
                Instruction::JumpIfFalse(3),
                Instruction::Literal(Constant::Int(10)),
                Instruction::Jump(2),
                Instruction::Literal(Constant::Int(20)),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn sequence_pops_intermediate_values() {
        let (code, _) = compile(Expr::sequence(vec![Expr::int(1), Expr::int(2)]));
        assert_eq!(
            code.as_ref(),
            &[
                Instruction::Literal(Constant::Int(1)),
                Instruction::Pop,
                Instruction::Literal(Constant::Int(2)),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn empty_sequence_leaves_nil() {
        let (code, _) = compile(Expr::sequence(vec![]));
        assert_eq!(
            code.as_ref(),
            &[Instruction::Literal(Constant::Nil), Instruction::Halt]
        );
    }

    #[test]
    fn lambda_body_ends_with_return() {
        let (code, _) = compile(Expr::lambda(&["x"], Expr::symbol("x")));
        let Instruction::Lambda(lc) = &code[0] else {
            panic!("expected a lambda instruction, got {:?}", code[0]);
        };
        assert_eq!(lc.params.len(), 1);
        assert!(matches!(lc.body.last(), Some(Instruction::Return)));
    }

    #[test]
    fn tail_call_inside_lambda_body() {
        // (lambda (n) (f n)) — the application is the body, so it is a
        // tail call.
        let (code, _) = compile(Expr::lambda(
            &["n"],
            Expr::invoke(vec![Expr::symbol("f"), Expr::symbol("n")]),
        ));
        let Instruction::Lambda(lc) = &code[0] else {
            panic!("expected a lambda instruction");
        };
        assert!(
            lc.body
                .iter()
                .any(|i| matches!(i, Instruction::InvokeTail(2)))
        );
        assert!(!lc.body.iter().any(|i| matches!(i, Instruction::Invoke(_))));
    }

    #[test]
    fn argument_calls_are_never_tail_calls() {
        // (lambda (n) (f (g n))) — the outer call is tail, the inner is not.
        let (code, _) = compile(Expr::lambda(
            &["n"],
            Expr::invoke(vec![
                Expr::symbol("f"),
                Expr::invoke(vec![Expr::symbol("g"), Expr::symbol("n")]),
            ]),
        ));
        let Instruction::Lambda(lc) = &code[0] else {
            panic!("expected a lambda instruction");
        };
        let invokes: Vec<_> = lc
            .body
            .iter()
            .filter(|i| matches!(i, Instruction::Invoke(_) | Instruction::InvokeTail(_)))
            .collect();
        assert_eq!(
            invokes,
            vec![&Instruction::Invoke(2), &Instruction::InvokeTail(2)]
        );
    }

    #[test]
    fn define_rhs_is_not_in_tail_position() {
        // (define f (g)) at the top level: the call feeding define must be
        // a plain invoke even though define is the program body.
        let (code, mut interner) = compile(Expr::define(
            "f",
            Expr::invoke(vec![Expr::symbol("g")]),
        ));
        let g = interner.intern("g");
        let f = interner.intern("f");
        assert_eq!(
            code.as_ref(),
            &[
                Instruction::Load(g),
                Instruction::Invoke(1),
                Instruction::Define(f),
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn both_if_arms_inherit_tail_position() {
        let (code, _) = compile(Expr::lambda(
            &["n"],
            Expr::if_(
                Expr::symbol("n"),
                Expr::invoke(vec![Expr::symbol("f")]),
                Expr::invoke(vec![Expr::symbol("g")]),
            ),
        ));
        let Instruction::Lambda(lc) = &code[0] else {
            panic!("expected a lambda instruction");
        };
        let tail_calls = lc
            .body
            .iter()
            .filter(|i| matches!(i, Instruction::InvokeTail(_)))
            .count();
        assert_eq!(tail_calls, 2);
    }
}
