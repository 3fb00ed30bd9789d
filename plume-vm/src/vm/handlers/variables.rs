// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Variable opcode handlers: LoadLocal, SetLocal, LoadClosure.

use crate::opcode::OpCode;
use crate::vm::{Result, RuntimeError, VM};

impl VM<'_> {
    /// Execute a variable opcode.
    pub(crate) fn execute_variables(&mut self, op: OpCode, index: usize) -> Result<()> {
        match op {
            OpCode::LoadLocal => {
                let scope = &self.frame()?.scope;
                let value = scope.get(index).ok_or(RuntimeError::LocalOutOfBounds {
                    slot: index,
                    len: scope.len(),
                })?;
                self.push(value)?;
            }
            OpCode::SetLocal => {
                let value = self.pop()?;
                let scope = &self.frame()?.scope;
                if !scope.set(index, value) {
                    return Err(RuntimeError::LocalOutOfBounds {
                        slot: index,
                        len: scope.len(),
                    });
                }
            }
            OpCode::LoadClosure => {
                let closure = self.frame()?.closure.ok_or(RuntimeError::MissingCapture(index))?;
                let value = self
                    .heap
                    .closure(closure)
                    .ok_or(RuntimeError::DanglingReference)?
                    .captures
                    .get(index)
                    .copied()
                    .ok_or(RuntimeError::MissingCapture(index))?;
                self.push(value)?;
            }
            _ => return Err(RuntimeError::UnknownOpcode(op)),
        }
        Ok(())
    }
}
