// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Fatal runtime errors for the VM.
//!
//! Type mismatches and calls of non-functions are not errors: those
//! operations push `undefined` and execution continues. Everything here means
//! the compiled program itself is malformed.

use thiserror::Error;

use crate::opcode::OpCode;
use crate::program::FunctionId;

/// Fatal error during VM execution.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An instruction needed more operands than the frame holds.
    #[error("Operand stack underflow")]
    StackUnderflow,
    /// Execution ran past the last instruction of a function.
    #[error("Program counter {pc} is past the end of {function} ({len} instructions)")]
    ProgramCounterOutOfBounds {
        function: FunctionId,
        pc: usize,
        len: usize,
    },
    /// `Return` executed in the outermost frame.
    #[error("Return with no caller frame")]
    MissingCallerFrame,
    /// A capture walked past the outermost defining scope.
    #[error("Capture at scope depth {depth} has no enclosing scope")]
    UnresolvedScopeHop { depth: u32 },
    /// A local slot index outside the frame.
    #[error("Local slot {slot} is out of bounds ({len} locals)")]
    LocalOutOfBounds { slot: usize, len: usize },
    /// A constant pool index outside the pool.
    #[error("Missing {pool} constant {index}")]
    MissingConstant { pool: &'static str, index: usize },
    /// A function table index outside the table.
    #[error("Missing function {0}")]
    MissingFunction(FunctionId),
    /// An object shape index outside the shape table.
    #[error("Missing object shape {0}")]
    MissingShape(usize),
    /// `LoadClosure` outside a closure, or past its capture list.
    #[error("Missing closure capture {0}")]
    MissingCapture(usize),
    /// A heap handle that does not refer to a live allocation.
    #[error("Dangling heap reference")]
    DanglingReference,
    /// A heap arena has handed out every handle it can address.
    #[error("Heap exhausted: no more {0} handles")]
    HeapExhausted(&'static str),
    /// An opcode reached a handler that does not implement it.
    #[error("Unknown opcode {0} for this handler")]
    UnknownOpcode(OpCode),
    /// The call stack is empty.
    #[error("No active frame")]
    NoActiveFrame,
    /// The output or input sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
