// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiled programs, function prototypes, and disassembly.

use std::fmt::{self, Write};

use crate::opcode::{Instruction, OpCode};

/// Most local slots one function frame may have, parameters included.
pub const MAX_LOCALS: u32 = 1 << 16;

/// How a nested function reaches a variable of an enclosing function.
///
/// A capture more than one function away is read from the enclosing frame
/// when the capturing closure is created, not when its parent was. By then
/// the slot may already hold a variable of a later sibling block that
/// reused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capture {
    /// Number of function boundaries between the capturing function and the
    /// declaration (1 = the immediately enclosing function).
    pub scope_depth: u32,

    /// Local slot of the declaration within that function's frame.
    pub local_index: u32,
}

impl Capture {
    pub fn new(scope_depth: u32, local_index: u32) -> Self {
        Self {
            scope_depth,
            local_index,
        }
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(depth {}, slot {})", self.scope_depth, self.local_index)
    }
}

/// A function prototype: the compiled representation of a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPrototype {
    /// Number of declared parameters.
    pub argument_count: u32,

    /// Number of local slots needed (high-water mark, parameters included).
    pub locals_count: u32,

    /// Variables captured from enclosing functions, in `LoadClosure` order.
    pub captures: Vec<Capture>,

    /// The frozen instruction stream.
    pub instructions: Box<[Instruction]>,
}

impl FunctionPrototype {
    pub fn new(
        argument_count: u32,
        locals_count: u32,
        captures: Vec<Capture>,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            argument_count,
            locals_count,
            captures,
            instructions: instructions.into_boxed_slice(),
        }
    }
}

/// Ordered property names of an object literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShape {
    pub keys: Vec<String>,
}

/// Identifies a function within a [`CompiledProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionId {
    /// The top-level script.
    Entry,
    /// Index into the function table.
    Table(usize),
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionId::Entry => write!(f, "<entry>"),
            FunctionId::Table(index) => write!(f, "fn #{}", index),
        }
    }
}

/// A fully compiled program. Immutable once produced; the VM only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub entry: FunctionPrototype,
    pub functions: Vec<FunctionPrototype>,
    pub shapes: Vec<ObjectShape>,
    pub integers: Vec<i64>,
    pub floats: Vec<f64>,
    pub strings: Vec<String>,
}

impl CompiledProgram {
    /// Look up a function by id.
    pub fn function(&self, id: FunctionId) -> Option<&FunctionPrototype> {
        match id {
            FunctionId::Entry => Some(&self.entry),
            FunctionId::Table(index) => self.functions.get(index),
        }
    }

    /// Produce a listing of one function: index, opcode, raw parameter and
    /// the resolved operand where there is one.
    pub fn disassemble(&self, id: FunctionId) -> String {
        let mut out = String::new();
        let Some(function) = self.function(id) else {
            let _ = writeln!(out, "== {} (missing) ==", id);
            return out;
        };

        let _ = writeln!(
            out,
            "== {} (args: {}, locals: {}, captures: {}) ==",
            id,
            function.argument_count,
            function.locals_count,
            function.captures.len()
        );
        for (offset, instruction) in function.instructions.iter().enumerate() {
            let _ = write!(
                out,
                "{:04} {:<24} {:>5}",
                offset, instruction.op, instruction.parameter
            );
            if let Some(operand) = self.resolve_operand(function, instruction) {
                let _ = write!(out, "  ; {}", operand);
            }
            out.push('\n');
        }
        out
    }

    /// Listing of the entry function followed by the whole function table.
    pub fn disassemble_all(&self) -> String {
        let mut out = self.disassemble(FunctionId::Entry);
        for index in 0..self.functions.len() {
            out.push_str(&self.disassemble(FunctionId::Table(index)));
        }
        out
    }

    fn resolve_operand(
        &self,
        function: &FunctionPrototype,
        instruction: &Instruction,
    ) -> Option<String> {
        let index = instruction.parameter as usize;
        let resolved = match instruction.op {
            OpCode::LoadIntegerConstant => match self.integers.get(index) {
                Some(n) => n.to_string(),
                None => "<missing integer>".to_string(),
            },
            OpCode::LoadFloatConstant => match self.floats.get(index) {
                Some(n) => format!("{:?}", n),
                None => "<missing float>".to_string(),
            },
            OpCode::LoadStringConstant => match self.strings.get(index) {
                Some(s) => format!("{:?}", s),
                None => "<missing string>".to_string(),
            },
            OpCode::LoadClosure => match function.captures.get(index) {
                Some(capture) => capture.to_string(),
                None => "<missing capture>".to_string(),
            },
            OpCode::MakeFn => FunctionId::Table(index).to_string(),
            OpCode::MakeObj => match self.shapes.get(index) {
                Some(shape) => format!("{{{}}}", shape.keys.join(", ")),
                None => "<missing shape>".to_string(),
            },
            OpCode::Jump | OpCode::JumpIfFalse => format!("-> {:04}", index),
            _ => return None,
        };
        Some(resolved)
    }
}
