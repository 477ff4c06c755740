//! Bytecode serialisation.
//!
//! Compiled bytecode holds interned symbol handles, which are meaningless
//! outside the interner that produced them. This module lowers bytecode to
//! a wire form in which symbols travel by name, so an artifact written by
//! one runtime loads into any other: names re-intern on the way back in.
//!
//! The wire form preserves everything the loader needs: opcode identity,
//! literal variants and payloads, lambda parameter lists, and nested lambda
//! bodies. JSON via serde_json is the reference encoding; any serde format
//! works.

use serde::{Deserialize, Serialize};

use crate::bytecode::{Code, Constant, Instruction, LambdaCode};
use crate::error::{Error, Result};
use crate::intern::Interner;
use std::rc::Rc;

/// Wire form of a literal constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireConstant {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Symbol(String),
}

/// Wire form of an instruction. Symbols appear by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireInstruction {
    Literal(WireConstant),
    Load(String),
    Define(String),
    Set(String),
    Pop,
    Jump(usize),
    JumpIfFalse(usize),
    Lambda {
        params: Vec<String>,
        body: Vec<WireInstruction>,
    },
    Invoke(usize),
    InvokeTail(usize),
    Return,
    Halt,
}

/// Lower bytecode to its wire form.
pub fn freeze(code: &[Instruction], interner: &Interner) -> Vec<WireInstruction> {
    code.iter()
        .map(|instr| match instr {
            Instruction::Literal(constant) => {
                WireInstruction::Literal(match constant {
                    Constant::Nil => WireConstant::Nil,
                    Constant::Bool(b) => WireConstant::Bool(*b),
                    Constant::Int(n) => WireConstant::Int(*n),
                    Constant::Str(s) => WireConstant::Str(s.to_string()),
                    Constant::Symbol(sym) => {
                        WireConstant::Symbol(interner.name(*sym).to_string())
                    }
                })
            }
            Instruction::Load(sym) => WireInstruction::Load(interner.name(*sym).to_string()),
            Instruction::Define(sym) => {
                WireInstruction::Define(interner.name(*sym).to_string())
            }
            Instruction::Set(sym) => WireInstruction::Set(interner.name(*sym).to_string()),
            Instruction::Pop => WireInstruction::Pop,
            Instruction::Jump(offset) => WireInstruction::Jump(*offset),
            Instruction::JumpIfFalse(offset) => WireInstruction::JumpIfFalse(*offset),
            Instruction::Lambda(lc) => WireInstruction::Lambda {
                params: lc
                    .params
                    .iter()
                    .map(|p| interner.name(*p).to_string())
                    .collect(),
                body: freeze(&lc.body, interner),
            },
            Instruction::Invoke(n) => WireInstruction::Invoke(*n),
            Instruction::InvokeTail(n) => WireInstruction::InvokeTail(*n),
            Instruction::Return => WireInstruction::Return,
            Instruction::Halt => WireInstruction::Halt,
        })
        .collect()
}

/// Rebuild executable bytecode from its wire form, interning symbol names
/// into the given interner.
pub fn thaw(wire: &[WireInstruction], interner: &mut Interner) -> Code {
    let instructions: Vec<Instruction> = wire
        .iter()
        .map(|instr| match instr {
            WireInstruction::Literal(constant) => Instruction::Literal(match constant {
                WireConstant::Nil => Constant::Nil,
                WireConstant::Bool(b) => Constant::Bool(*b),
                WireConstant::Int(n) => Constant::Int(*n),
                WireConstant::Str(s) => Constant::Str(Rc::from(s.as_str())),
                WireConstant::Symbol(name) => Constant::Symbol(interner.intern(name)),
            }),
            WireInstruction::Load(name) => Instruction::Load(interner.intern(name)),
            WireInstruction::Define(name) => Instruction::Define(interner.intern(name)),
            WireInstruction::Set(name) => Instruction::Set(interner.intern(name)),
            WireInstruction::Pop => Instruction::Pop,
            WireInstruction::Jump(offset) => Instruction::Jump(*offset),
            WireInstruction::JumpIfFalse(offset) => Instruction::JumpIfFalse(*offset),
            WireInstruction::Lambda { params, body } => {
                let params = params.iter().map(|p| interner.intern(p)).collect();
                let body = thaw(body, interner);
                Instruction::Lambda(Rc::new(LambdaCode { params, body }))
            }
            WireInstruction::Invoke(n) => Instruction::Invoke(*n),
            WireInstruction::InvokeTail(n) => Instruction::InvokeTail(*n),
            WireInstruction::Return => Instruction::Return,
            WireInstruction::Halt => Instruction::Halt,
        })
        .collect();
    instructions.into()
}

/// Serialise bytecode to a JSON artifact.
pub fn to_json(code: &[Instruction], interner: &Interner) -> Result<String> {
    serde_json::to_string(&freeze(code, interner))
        .map_err(|e| Error::MalformedBytecode(format!("cannot encode bytecode: {e}")))
}

/// Load bytecode from a JSON artifact.
pub fn from_json(json: &str, interner: &mut Interner) -> Result<Code> {
    let wire: Vec<WireInstruction> = serde_json::from_str(json)
        .map_err(|e| Error::MalformedBytecode(format!("invalid bytecode artifact: {e}")))?;
    Ok(thaw(&wire, interner))
}
