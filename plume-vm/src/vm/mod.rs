// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Plume bytecode.

pub mod dump;
pub mod error;
pub mod frame;
pub mod handlers;
pub mod stack;

use std::collections::HashMap;
use std::io::{BufRead, Write};

use tracing::{debug, trace};

use crate::heap::Heap;
use crate::opcode::{Instruction, OpCode};
use crate::program::CompiledProgram;
use crate::value::{StrRef, Variable};

pub use error::{Result, RuntimeError};
pub use frame::{CallFrame, Scope};
pub use stack::ValueStack;

/// Settings that change how the VM runs, not what it computes.
#[derive(Debug, Clone, Default)]
pub struct VmOptions {
    /// Write the full machine state to the output sink before every
    /// instruction.
    pub step: bool,

    /// When set, `env(name)` reads from this map instead of the process
    /// environment.
    pub environment: Option<HashMap<String, String>>,
}

/// What the VM did on the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// The Plume virtual machine.
///
/// Executes one [`CompiledProgram`], which it only ever reads.
pub struct VM<'a> {
    program: &'a CompiledProgram,

    /// Call frame stack; the last frame is executing.
    frames: Vec<CallFrame>,

    heap: Heap,

    /// Heap handle of each string pool entry, allocated on first load.
    string_constants: Vec<Option<StrRef>>,

    out: &'a mut dyn Write,
    input: &'a mut dyn BufRead,

    options: VmOptions,

    /// Set once `Halt` executes.
    halted: bool,

    /// Set while a fatal error is being reported.
    panicking: bool,
}

impl<'a> VM<'a> {
    /// Create a VM positioned at the first instruction of the entry function.
    pub fn new(
        program: &'a CompiledProgram,
        out: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
    ) -> Self {
        Self::with_options(program, out, input, VmOptions::default())
    }

    pub fn with_options(
        program: &'a CompiledProgram,
        out: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
        options: VmOptions,
    ) -> Self {
        let entry = CallFrame::entry(program.entry.locals_count as usize);
        Self {
            program,
            frames: vec![entry],
            heap: Heap::new(),
            string_constants: vec![None; program.strings.len()],
            out,
            input,
            options,
            halted: false,
            panicking: false,
        }
    }

    /// Run until `Halt`.
    ///
    /// A fatal error dumps the machine state to the output sink and releases
    /// the heap before it is returned.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.options.step {
                let state = self.machine_state();
                if let Err(e) = self.out.write_all(state.as_bytes()) {
                    let err = RuntimeError::Io(e);
                    self.report_fatal(&err);
                    return Err(err);
                }
            }
            match self.step() {
                Ok(Status::Running) => {}
                Ok(Status::Halted) => return Ok(()),
                Err(err) => {
                    self.report_fatal(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Execute a single instruction.
    ///
    /// Errors are returned without being reported; [`run`](Self::run) does
    /// the reporting.
    pub fn step(&mut self) -> Result<Status> {
        if self.halted {
            return Ok(Status::Halted);
        }
        let instruction = self.fetch()?;
        self.dispatch(instruction)?;
        Ok(if self.halted {
            Status::Halted
        } else {
            Status::Running
        })
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn program(&self) -> &CompiledProgram {
        self.program
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Operand stack of the executing frame, bottom first.
    pub fn operands(&self) -> &[Variable] {
        self.frames
            .last()
            .map(|frame| frame.operands.as_slice())
            .unwrap_or_default()
    }

    // ========================================================================
    // Fetch & dispatch
    // ========================================================================

    fn fetch(&mut self) -> Result<Instruction> {
        let program = self.program;
        let frame = self.frames.last_mut().ok_or(RuntimeError::NoActiveFrame)?;
        let function = program
            .function(frame.function)
            .ok_or(RuntimeError::MissingFunction(frame.function))?;
        let instruction = function.instructions.get(frame.pc).copied().ok_or(
            RuntimeError::ProgramCounterOutOfBounds {
                function: frame.function,
                pc: frame.pc,
                len: function.instructions.len(),
            },
        )?;
        trace!(
            function = %frame.function,
            pc = frame.pc,
            op = %instruction.op,
            parameter = instruction.parameter,
            depth = frame.operands.len(),
            "dispatch"
        );
        frame.pc += 1;
        Ok(instruction)
    }

    fn dispatch(&mut self, instruction: Instruction) -> Result<()> {
        let Instruction { op, parameter } = instruction;
        let index = parameter as usize;
        match op {
            // Constants & Stack - handled inline
            OpCode::Halt => {
                self.halted = true;
                debug!(frames = self.frames.len(), "halted");
                self.heap.release();
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::LoadUndefinedConstant => self.push(Variable::Undefined)?,
            OpCode::LoadBooleanTrueConstant => self.push(Variable::Boolean(true))?,
            OpCode::LoadBooleanFalseConstant => self.push(Variable::Boolean(false))?,
            OpCode::LoadIntegerConstant => {
                let value = self.program.integers.get(index).copied().ok_or(
                    RuntimeError::MissingConstant {
                        pool: "integer",
                        index,
                    },
                )?;
                self.push(Variable::Integer(value))?;
            }
            OpCode::LoadFloatConstant => {
                let value = self.program.floats.get(index).copied().ok_or(
                    RuntimeError::MissingConstant {
                        pool: "float",
                        index,
                    },
                )?;
                self.push(Variable::Float(value))?;
            }
            OpCode::LoadStringConstant => {
                let handle = self.string_constant(index)?;
                self.push(Variable::String(handle))?;
            }

            // Variables - delegated to handler
            OpCode::LoadLocal | OpCode::SetLocal | OpCode::LoadClosure => {
                self.execute_variables(op, index)?;
            }

            // Control flow - delegated to handler
            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Return
            | OpCode::Invoke
            | OpCode::MakeFn => {
                self.execute_control(op, index)?;
            }

            // Arithmetic, comparison and logic - delegated to handler
            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Not
            | OpCode::And
            | OpCode::Or
            | OpCode::Less
            | OpCode::LessOrEqual
            | OpCode::Greater
            | OpCode::GreaterOrEqual => {
                self.execute_arithmetic(op)?;
            }

            // Objects - delegated to handler
            OpCode::MakeObj | OpCode::ObjectGet | OpCode::ObjectSet => {
                self.execute_objects(op, index)?;
            }

            // I/O, introspection and strings - delegated to handler
            OpCode::Read
            | OpCode::Print
            | OpCode::GetEnv
            | OpCode::GetType
            | OpCode::CastToInt
            | OpCode::CastToFloat
            | OpCode::Length
            | OpCode::CharAt
            | OpCode::StringAppend => {
                self.execute_builtins(op)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Frame helpers
    // ========================================================================

    fn frame(&self) -> Result<&CallFrame> {
        self.frames.last().ok_or(RuntimeError::NoActiveFrame)
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame> {
        self.frames.last_mut().ok_or(RuntimeError::NoActiveFrame)
    }

    /// Pop from the executing frame's operand stack.
    pub(crate) fn pop(&mut self) -> Result<Variable> {
        self.frame_mut()?.operands.pop()
    }

    /// Push onto the executing frame's operand stack.
    pub(crate) fn push(&mut self, value: Variable) -> Result<()> {
        self.frame_mut()?.operands.push(value);
        Ok(())
    }

    /// Pop two operands, returning them in push order.
    pub(crate) fn pop_pair(&mut self) -> Result<(Variable, Variable)> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }

    /// Heap copy of a string pool entry. Every load of the same entry shares
    /// one allocation.
    fn string_constant(&mut self, index: usize) -> Result<StrRef> {
        let missing = RuntimeError::MissingConstant {
            pool: "string",
            index,
        };
        match self.string_constants.get(index) {
            Some(Some(handle)) => Ok(*handle),
            Some(None) => {
                let value = self.program.strings.get(index).ok_or(missing)?;
                let handle = self.heap.alloc_string(value.clone())?;
                self.string_constants[index] = Some(handle);
                Ok(handle)
            }
            None => Err(missing),
        }
    }

    /// Contents of a heap string.
    pub(crate) fn string(&self, value: StrRef) -> Result<&str> {
        self.heap
            .string(value)
            .ok_or(RuntimeError::DanglingReference)
    }

    /// Allocate a string and push it.
    pub(crate) fn push_string(&mut self, s: String) -> Result<()> {
        let handle = self.heap.alloc_string(s)?;
        self.push(Variable::String(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::FunctionPrototype;

    fn program(instructions: Vec<Instruction>) -> CompiledProgram {
        CompiledProgram {
            entry: FunctionPrototype::new(0, 1, vec![], instructions),
            functions: vec![],
            shapes: vec![],
            integers: vec![40, 2],
            floats: vec![],
            strings: vec!["hi".into()],
        }
    }

    #[test]
    fn test_step_through_program() {
        let program = program(vec![
            Instruction::new(OpCode::LoadIntegerConstant, 0),
            Instruction::new(OpCode::LoadIntegerConstant, 1),
            Instruction::bare(OpCode::Add),
            Instruction::bare(OpCode::Halt),
        ]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let mut vm = VM::new(&program, &mut out, &mut input);

        assert_eq!(vm.step().unwrap(), Status::Running);
        assert_eq!(vm.step().unwrap(), Status::Running);
        assert_eq!(vm.operands().len(), 2);
        assert_eq!(vm.step().unwrap(), Status::Running);
        assert!(matches!(vm.operands(), [Variable::Integer(42)]));
        assert_eq!(vm.step().unwrap(), Status::Halted);
        assert!(vm.is_halted());
        assert!(vm.heap().is_released());
        assert_eq!(vm.step().unwrap(), Status::Halted);
    }

    #[test]
    fn test_missing_constant_is_fatal() {
        let program = program(vec![Instruction::new(OpCode::LoadIntegerConstant, 5)]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let mut vm = VM::new(&program, &mut out, &mut input);
        assert!(matches!(
            vm.step(),
            Err(RuntimeError::MissingConstant {
                pool: "integer",
                index: 5
            })
        ));
    }

    #[test]
    fn test_running_off_the_end_is_fatal() {
        let program = program(vec![Instruction::bare(OpCode::LoadUndefinedConstant)]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let result = VM::new(&program, &mut out, &mut input).run();
        assert!(matches!(
            result,
            Err(RuntimeError::ProgramCounterOutOfBounds { pc: 1, len: 1, .. })
        ));
        let dump = String::from_utf8(out).unwrap();
        assert!(dump.starts_with("PANIC: Program counter 1"));
    }

    #[test]
    fn test_pop_underflow_is_fatal() {
        let program = program(vec![Instruction::bare(OpCode::Pop)]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let result = VM::new(&program, &mut out, &mut input).run();
        assert!(matches!(result, Err(RuntimeError::StackUnderflow)));
    }

    #[test]
    fn test_step_mode_prints_state() {
        let program = program(vec![
            Instruction::new(OpCode::LoadStringConstant, 0),
            Instruction::bare(OpCode::Halt),
        ]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let options = VmOptions {
            step: true,
            ..VmOptions::default()
        };
        VM::with_options(&program, &mut out, &mut input, options)
            .run()
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("== machine state ==").count(), 2);
        assert!(text.contains("<string #0>"));
    }

    #[test]
    fn test_string_constant_allocated_once() {
        let program = crate::interpreter::compile_source(
            r#"var i = 0; while (less(i, 1000)) { var s = "x"; i = add(i, 1); }"#,
        )
        .unwrap();
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let mut vm = VM::new(&program, &mut out, &mut input);

        let mut peak = 0;
        while vm.step().unwrap() == Status::Running {
            peak = peak.max(vm.heap().len());
        }
        assert_eq!(peak, 1);
    }

    #[test]
    fn test_string_constants_share_handle() {
        let program = program(vec![
            Instruction::new(OpCode::LoadStringConstant, 0),
            Instruction::new(OpCode::LoadStringConstant, 0),
            Instruction::bare(OpCode::Halt),
        ]);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let mut vm = VM::new(&program, &mut out, &mut input);
        vm.step().unwrap();
        vm.step().unwrap();
        assert!(matches!(
            vm.operands(),
            [Variable::String(a), Variable::String(b)] if a == b
        ));
        assert_eq!(vm.heap().len(), 1);
    }
}
