//! Round-trip tests for the bytecode serialisation layer.
#![cfg(feature = "serde")]

use lispet::transpile;
use lispet::{Expr, Program, Runtime, Value};
use pretty_assertions::assert_eq;

fn call(name: &str, args: Vec<Expr>) -> Expr {
    let mut exprs = vec![Expr::symbol(name)];
    exprs.extend(args);
    Expr::invoke(exprs)
}

fn factorial_module() -> Program {
    Program::new(Expr::define(
        "factorial",
        Expr::lambda(
            &["n"],
            Expr::if_(
                call("=", vec![Expr::symbol("n"), Expr::int(0)]),
                Expr::int(1),
                call(
                    "*",
                    vec![
                        Expr::symbol("n"),
                        call(
                            "factorial",
                            vec![call("-", vec![Expr::symbol("n"), Expr::int(1)])],
                        ),
                    ],
                ),
            ),
        ),
    ))
}

#[test]
fn frozen_bytecode_runs_in_a_fresh_runtime() {
    // Compile in one runtime...
    let mut writer = Runtime::new();
    let code = writer.compile(&factorial_module()).unwrap();
    let artifact = transpile::to_json(&code, writer.vm().interner()).unwrap();

    // ...and load the artifact into a completely separate one. Symbols
    // re-intern by name, so the reloaded module binds against the fresh
    // runtime's primitives.
    let mut reader = Runtime::new();
    let reloaded = transpile::from_json(&artifact, reader.vm_mut().interner_mut()).unwrap();
    reader.import(reloaded).unwrap();

    let result = reader
        .run(&Program::new(call("factorial", vec![Expr::int(5)])))
        .unwrap();
    assert_eq!(result, Value::Int(120));
}

#[test]
fn freezing_preserves_nested_lambda_bodies() {
    let mut rt = Runtime::new();
    // A lambda inside a lambda, to make sure nesting survives the trip.
    let program = Program::new(Expr::define(
        "make-adder",
        Expr::lambda(
            &["n"],
            Expr::lambda(&["m"], call("+", vec![Expr::symbol("n"), Expr::symbol("m")])),
        ),
    ));
    let code = rt.compile(&program).unwrap();
    let artifact = transpile::to_json(&code, rt.vm().interner()).unwrap();

    let mut fresh = Runtime::new();
    let reloaded = transpile::from_json(&artifact, fresh.vm_mut().interner_mut()).unwrap();
    fresh.import(reloaded).unwrap();

    let result = fresh
        .run(&Program::new(call(
            "make-adder",
            vec![Expr::int(2)],
        )))
        .map(|adder| fresh.render(&adder))
        .unwrap();
    assert_eq!(result, "(lambda)");

    let applied = fresh
        .run(&Program::new(Expr::invoke(vec![
            call("make-adder", vec![Expr::int(2)]),
            Expr::int(40),
        ])))
        .unwrap();
    assert_eq!(applied, Value::Int(42));
}
