// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Operand stack for a call frame.

use crate::value::Variable;

use super::{Result, RuntimeError};

/// One frame's operand stack.
#[derive(Debug, Default, Clone)]
pub struct ValueStack {
    values: Vec<Variable>,
}

impl ValueStack {
    /// Create a new empty stack.
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(16),
        }
    }

    /// Push a value onto the stack.
    #[inline]
    pub fn push(&mut self, value: Variable) {
        self.values.push(value);
    }

    /// Pop a value from the stack.
    #[inline]
    pub fn pop(&mut self) -> Result<Variable> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Get the current stack size.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pop n values and return them in push order.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Variable>> {
        if n > self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        let start = self.values.len() - n;
        Ok(self.values.drain(start..).collect())
    }

    /// The stack contents, bottom first.
    pub fn as_slice(&self) -> &[Variable] {
        &self.values
    }
}
