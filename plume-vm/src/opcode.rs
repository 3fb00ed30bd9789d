// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction definitions.

use std::fmt;

use plume_parser::Builtin;

/// Opcodes for the Plume VM.
///
/// Every instruction carries one unsigned parameter (see [`Instruction`]);
/// the comment on each opcode says how the parameter is used. Instructions
/// operate on the current frame's operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants & Stack
    // =========================================================================
    /// Stop execution of the program.
    Halt = 0,

    /// Pop top value from stack.
    Pop,

    /// Push undefined.
    LoadUndefinedConstant,

    /// Push true.
    LoadBooleanTrueConstant,

    /// Push false.
    LoadBooleanFalseConstant,

    /// Push integer pool entry `param`.
    LoadIntegerConstant,

    /// Push float pool entry `param`.
    LoadFloatConstant,

    /// Push string pool entry `param` as a fresh heap string.
    LoadStringConstant,

    // =========================================================================
    // Variables
    // =========================================================================
    /// Push local slot `param`.
    LoadLocal,

    /// Pop into local slot `param`.
    SetLocal,

    /// Push capture `param` of the running closure.
    LoadClosure,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Continue at absolute instruction index `param`.
    Jump,

    /// Pop; if falsy continue at absolute instruction index `param`.
    JumpIfFalse,

    /// Pop return value, discard the frame, push the value onto the caller.
    Return,

    /// Call the function below the top `param` arguments.
    Invoke,

    /// Create a closure over function table entry `param`.
    MakeFn,

    /// Build an object from shape table entry `param`.
    MakeObj,

    // =========================================================================
    // Built-in Operations
    // =========================================================================
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Not,
    And,
    Or,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    ObjectGet,
    ObjectSet,
    Read,
    Print,
    GetEnv,
    GetType,
    CastToInt,
    CastToFloat,
    Length,
    CharAt,
    StringAppend,
}

impl OpCode {
    /// Every opcode, in encoding order.
    pub const ALL: [OpCode; 41] = [
        OpCode::Halt,
        OpCode::Pop,
        OpCode::LoadUndefinedConstant,
        OpCode::LoadBooleanTrueConstant,
        OpCode::LoadBooleanFalseConstant,
        OpCode::LoadIntegerConstant,
        OpCode::LoadFloatConstant,
        OpCode::LoadStringConstant,
        OpCode::LoadLocal,
        OpCode::SetLocal,
        OpCode::LoadClosure,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::Return,
        OpCode::Invoke,
        OpCode::MakeFn,
        OpCode::MakeObj,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Not,
        OpCode::And,
        OpCode::Or,
        OpCode::Less,
        OpCode::LessOrEqual,
        OpCode::Greater,
        OpCode::GreaterOrEqual,
        OpCode::ObjectGet,
        OpCode::ObjectSet,
        OpCode::Read,
        OpCode::Print,
        OpCode::GetEnv,
        OpCode::GetType,
        OpCode::CastToInt,
        OpCode::CastToFloat,
        OpCode::Length,
        OpCode::CharAt,
        OpCode::StringAppend,
    ];

    /// Decode an opcode from its byte encoding.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// The byte encoding of this opcode.
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// The opcode a built-in call compiles to.
    pub fn for_builtin(builtin: Builtin) -> OpCode {
        match builtin {
            Builtin::Add => OpCode::Add,
            Builtin::Subtract => OpCode::Subtract,
            Builtin::Multiply => OpCode::Multiply,
            Builtin::Divide => OpCode::Divide,
            Builtin::Equal => OpCode::Equal,
            Builtin::NotEqual => OpCode::NotEqual,
            Builtin::Not => OpCode::Not,
            Builtin::And => OpCode::And,
            Builtin::Or => OpCode::Or,
            Builtin::Greater => OpCode::Greater,
            Builtin::Less => OpCode::Less,
            Builtin::GreaterOrEqual => OpCode::GreaterOrEqual,
            Builtin::LessOrEqual => OpCode::LessOrEqual,
            Builtin::Get => OpCode::ObjectGet,
            Builtin::Set => OpCode::ObjectSet,
            Builtin::Read => OpCode::Read,
            Builtin::Print => OpCode::Print,
            Builtin::Env => OpCode::GetEnv,
            Builtin::Type => OpCode::GetType,
            Builtin::Int => OpCode::CastToInt,
            Builtin::Float => OpCode::CastToFloat,
            Builtin::Length => OpCode::Length,
            Builtin::CharAt => OpCode::CharAt,
            Builtin::Append => OpCode::StringAppend,
        }
    }

    /// Returns true if the parameter is an instruction index to be patched.
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:?}", self))
    }
}

/// One bytecode instruction: an opcode and its parameter.
///
/// Instructions are mutable while a function body is being emitted (jump
/// targets are patched in place) and frozen once the prototype is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub parameter: u32,
}

impl Instruction {
    pub fn new(op: OpCode, parameter: u32) -> Self {
        Self { op, parameter }
    }

    /// An instruction whose parameter is unused.
    pub fn bare(op: OpCode) -> Self {
        Self { op, parameter: 0 }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_encoding_matches_table() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(op.to_byte() as usize, i);
            assert_eq!(OpCode::from_byte(i as u8), Some(*op));
        }
        assert_eq!(OpCode::from_byte(OpCode::ALL.len() as u8), None);
        assert_eq!(OpCode::from_byte(255), None);
    }

    #[test]
    fn test_every_builtin_has_an_opcode() {
        assert_eq!(OpCode::for_builtin(Builtin::Get), OpCode::ObjectGet);
        assert_eq!(OpCode::for_builtin(Builtin::Append), OpCode::StringAppend);
        let ops: Vec<OpCode> = Builtin::ALL.into_iter().map(OpCode::for_builtin).collect();
        for (i, op) in ops.iter().enumerate() {
            assert!(!ops[i + 1..].contains(op));
        }
    }

    #[test]
    fn test_is_jump() {
        assert!(OpCode::Jump.is_jump());
        assert!(OpCode::JumpIfFalse.is_jump());
        assert!(!OpCode::Invoke.is_jump());
    }
}
