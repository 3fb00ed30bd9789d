// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow opcode handlers: Jump, JumpIfFalse, Return, Invoke, MakeFn.

use std::rc::Rc;

use tracing::debug;

use crate::heap::Closure;
use crate::opcode::OpCode;
use crate::program::FunctionId;
use crate::value::{FnRef, Variable};
use crate::vm::frame::{CallFrame, Scope};
use crate::vm::{Result, RuntimeError, VM};

impl VM<'_> {
    /// Execute a control flow opcode.
    pub(crate) fn execute_control(&mut self, op: OpCode, index: usize) -> Result<()> {
        match op {
            OpCode::Jump => {
                self.frame_mut()?.pc = index;
            }
            OpCode::JumpIfFalse => {
                let condition = self.pop()?;
                if !condition.is_truthy() {
                    self.frame_mut()?.pc = index;
                }
            }
            OpCode::Return => self.execute_return()?,
            OpCode::Invoke => self.execute_invoke(index)?,
            OpCode::MakeFn => self.execute_make_fn(index)?,
            _ => return Err(RuntimeError::UnknownOpcode(op)),
        }
        Ok(())
    }

    /// Pop the return value, discard the frame and push the value onto the
    /// caller's operand stack. The entry frame has no caller.
    fn execute_return(&mut self) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(RuntimeError::MissingCallerFrame);
        }
        let value = self.pop()?;
        if let Some(frame) = self.frames.pop() {
            debug!(function = %frame.function, depth = self.frames.len(), "return");
        }
        self.push(value)
    }

    /// Call the value below the top `argc` operands.
    ///
    /// Calling anything but a function pushes `undefined`. Extra arguments
    /// are dropped and missing ones are left `undefined`.
    fn execute_invoke(&mut self, argc: usize) -> Result<()> {
        let args = self.frame_mut()?.operands.pop_n(argc)?;
        let callee = self.pop()?;
        let Variable::Function(handle) = callee else {
            return self.push(Variable::Undefined);
        };

        let closure = self
            .heap
            .closure(handle)
            .ok_or(RuntimeError::DanglingReference)?;
        let function = closure.function;
        let defining_scope = Rc::clone(&closure.defining_scope);
        let program = self.program;
        let prototype = program
            .functions
            .get(function)
            .ok_or(RuntimeError::MissingFunction(FunctionId::Table(function)))?;

        let locals_count = (prototype.locals_count as usize).max(prototype.argument_count as usize);
        let mut locals = vec![Variable::Undefined; locals_count];
        let bound = args.len().min(prototype.argument_count as usize);
        locals[..bound].copy_from_slice(&args[..bound]);

        let scope = Rc::new(Scope::new(locals, Some(defining_scope)));
        self.frames.push(CallFrame::call(function, handle, scope));
        debug!(
            function,
            argc,
            depth = self.frames.len(),
            "call"
        );
        Ok(())
    }

    /// Create a closure, reading each capture from the scope `depth - 1`
    /// hops out along the defining-scope chain of the executing frame.
    fn execute_make_fn(&mut self, function: usize) -> Result<()> {
        let program = self.program;
        let prototype = program
            .functions
            .get(function)
            .ok_or(RuntimeError::MissingFunction(FunctionId::Table(function)))?;
        let scope = Rc::clone(&self.frame()?.scope);

        let mut captures = Vec::with_capacity(prototype.captures.len());
        for capture in &prototype.captures {
            let depth = capture.scope_depth;
            let mut target = Some(&scope);
            for _ in 1..depth {
                target = target.and_then(|s| s.outer());
            }
            let target = match target {
                Some(target) if depth > 0 => target,
                _ => return Err(RuntimeError::UnresolvedScopeHop { depth }),
            };
            let slot = capture.local_index as usize;
            let value = target.get(slot).ok_or(RuntimeError::LocalOutOfBounds {
                slot,
                len: target.len(),
            })?;
            captures.push(value);
        }

        let handle: FnRef = self.heap.alloc_closure(Closure {
            function,
            captures,
            defining_scope: scope,
        })?;
        self.push(Variable::Function(handle))
    }
}
