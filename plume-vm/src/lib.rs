// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Plume.
//!
//! A parsed script is analysed, compiled to a [`CompiledProgram`] of
//! per-function instruction streams and constant pools, then executed by the
//! [`VM`]. Compiled programs can be written to and read from the `.plmb`
//! binary format with [`bytecode`].

pub mod bytecode;
pub mod compiler;
pub mod heap;
pub mod interpreter;
pub mod opcode;
pub mod program;
pub mod value;
pub mod vm;

pub use bytecode::DecodeError;
pub use compiler::{CompileError, SemanticError, SemanticErrors, analyse, compile};
pub use heap::Heap;
pub use interpreter::{InterpretError, Interpreter, compile_source};
pub use opcode::{Instruction, OpCode};
pub use program::{
    Capture, CompiledProgram, FunctionId, FunctionPrototype, MAX_LOCALS, ObjectShape,
};
pub use value::Variable;
pub use vm::{RuntimeError, Status, VM, VmOptions};
