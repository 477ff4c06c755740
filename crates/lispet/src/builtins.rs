//! Built-in primitives.
//!
//! This module seeds the global environment with the native functions the
//! language ships: equality, integer arithmetic, `not`, the two output
//! primitives, and `call-with-current-continuation`.
//!
//! Natives follow the standard call protocol: the VM binds their arguments
//! into a fresh scope under the global environment and hands them the
//! calling frame; they push exactly one result onto the frame they return.
//! Ordinary primitives return the calling frame itself; `call/cc` is the
//! one that returns a different frame.

use std::rc::Rc;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::intern::Symbol;
use crate::value::{Continuation, Value};
use crate::vm::{Frame, Vm};

fn expect_int(value: &Value) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(Error::Type {
            expected: "int".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

fn define_arithmetic(
    vm: &mut Vm,
    arg0: Symbol,
    arg1: Symbol,
    name: &str,
    apply: fn(i64, i64) -> Result<i64>,
) {
    vm.define_native(name, vec![arg0, arg1], move |_vm, frame, env| {
        let a = expect_int(&env.borrow().lookup(arg0))?;
        let b = expect_int(&env.borrow().lookup(arg1))?;
        let result = apply(a, b)?;
        frame.borrow_mut().push(Value::Int(result));
        Ok(frame)
    });
}

/// Install the primitive set into the VM's global environment.
pub fn install(vm: &mut Vm) {
    let arg0 = vm.intern("arg0");
    let arg1 = vm.intern("arg1");

    // Value equality: same variant, equal payload; reference variants by
    // identity. No numeric coercion.
    vm.define_native("=", vec![arg0, arg1], move |_vm, frame, env| {
        let a = env.borrow().lookup(arg0);
        let b = env.borrow().lookup(arg1);
        frame.borrow_mut().push(Value::Bool(a == b));
        Ok(frame)
    });

    define_arithmetic(vm, arg0, arg1, "+", |a, b| {
        a.checked_add(b).ok_or(Error::Overflow)
    });
    define_arithmetic(vm, arg0, arg1, "-", |a, b| {
        a.checked_sub(b).ok_or(Error::Overflow)
    });
    define_arithmetic(vm, arg0, arg1, "*", |a, b| {
        a.checked_mul(b).ok_or(Error::Overflow)
    });
    // Integer division truncates toward zero; dividing by zero fails.
    define_arithmetic(vm, arg0, arg1, "/", |a, b| {
        if b == 0 {
            return Err(Error::DivisionByZero);
        }
        a.checked_div(b).ok_or(Error::Overflow)
    });

    vm.define_native("not", vec![arg0], move |_vm, frame, env| {
        let value = env.borrow().lookup(arg0);
        frame.borrow_mut().push(Value::Bool(!value.is_truthy()));
        Ok(frame)
    });

    vm.define_native("display", vec![arg0], move |vm, frame, env| {
        let value = env.borrow().lookup(arg0);
        let text = vm.render(&value);
        vm.write_output(&text);
        frame.borrow_mut().push(Value::Nil);
        Ok(frame)
    });

    vm.define_native("newline", Vec::new(), move |vm, frame, _env| {
        vm.write_output("\n");
        frame.borrow_mut().push(Value::Nil);
        Ok(frame)
    });

    // call/cc receives a one-parameter lambda f. The continuation snapshots
    // the calling frame (whose pc is already past the invoke, and whose
    // stack will receive the call/cc result), then f runs in a new frame
    // with the continuation as its argument. If f returns normally its
    // value becomes the value of the call/cc expression; applying the
    // continuation instead restarts the captured frame with the applied
    // value.
    vm.define_native(
        "call-with-current-continuation",
        vec![arg0],
        move |_vm, frame, env| {
            let target = env.borrow().lookup(arg0);
            let lambda = match target {
                Value::Lambda(lambda) => lambda,
                other => {
                    return Err(Error::Type {
                        expected: "a lambda of one parameter".to_string(),
                        got: other.type_name().to_string(),
                    });
                }
            };
            if lambda.params.len() != 1 {
                return Err(Error::Type {
                    expected: "a lambda of one parameter".to_string(),
                    got: format!("a lambda of {} parameters", lambda.params.len()),
                });
            }
            let continuation = Value::Continuation(Rc::new(Continuation {
                frame: Frame::snapshot(&frame),
            }));
            let inner = Environment::child(&lambda.env);
            inner.borrow_mut().define(lambda.params[0], continuation);
            Ok(Frame::new(lambda.body.clone(), inner, Some(frame)))
        },
    );
}
