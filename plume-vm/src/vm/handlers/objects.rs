// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Object opcode handlers: MakeObj, ObjectGet, ObjectSet.

use crate::heap::Properties;
use crate::opcode::OpCode;
use crate::value::Variable;
use crate::vm::{Result, RuntimeError, VM};

impl VM<'_> {
    /// Execute an object opcode.
    pub(crate) fn execute_objects(&mut self, op: OpCode, index: usize) -> Result<()> {
        match op {
            OpCode::MakeObj => {
                let program = self.program;
                let shape = program
                    .shapes
                    .get(index)
                    .ok_or(RuntimeError::MissingShape(index))?;
                let values = self.frame_mut()?.operands.pop_n(shape.keys.len())?;
                let mut properties = Properties::with_capacity(values.len());
                for (key, value) in shape.keys.iter().zip(values) {
                    properties.insert(key.clone(), value);
                }
                let handle = self.heap.alloc_object(properties)?;
                self.push(Variable::Object(handle))?;
            }
            OpCode::ObjectGet => {
                let (object, key) = self.pop_pair()?;
                let value = match (object, key) {
                    (Variable::Object(object), Variable::String(key)) => {
                        let key = self.string(key)?;
                        self.heap
                            .object(object)
                            .ok_or(RuntimeError::DanglingReference)?
                            .get(key)
                            .copied()
                            .unwrap_or(Variable::Undefined)
                    }
                    _ => Variable::Undefined,
                };
                self.push(value)?;
            }
            OpCode::ObjectSet => {
                let value = self.pop()?;
                let (object, key) = self.pop_pair()?;
                let result = match (object, key) {
                    (Variable::Object(object), Variable::String(key)) => {
                        let key = self.string(key)?.to_string();
                        self.heap
                            .object_mut(object)
                            .ok_or(RuntimeError::DanglingReference)?
                            .insert(key, value);
                        value
                    }
                    _ => Variable::Undefined,
                };
                self.push(result)?;
            }
            _ => return Err(RuntimeError::UnknownOpcode(op)),
        }
        Ok(())
    }
}
