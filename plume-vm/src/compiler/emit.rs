// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-function emission context.
//!
//! One [`EmissionContext`] exists for each function body being compiled. It
//! owns the instruction buffer and does the bookkeeping the code generator
//! needs: local slot allocation with reuse across sequential scopes, jump
//! backpatching, loop break sites, and the capture table.

use std::collections::HashMap;

use crate::opcode::{Instruction, OpCode};
use crate::program::{Capture, FunctionPrototype, MAX_LOCALS};

use super::types::{CompileError, Result, parameter};

#[derive(Debug, Default)]
pub struct EmissionContext {
    argument_count: u32,

    /// Slot table: the name most recently declared in each slot.
    variables: Vec<String>,

    /// First slot not held by a visible declaration.
    first_free_index: usize,

    /// `first_free_index` at the start of each open scope.
    scope_starts: Vec<usize>,

    /// Highest `first_free_index` reached; becomes the locals count.
    high_water: usize,

    instructions: Vec<Instruction>,
    captures: Vec<Capture>,

    /// Start offsets of the enclosing loops, innermost last.
    loop_starts: Vec<usize>,

    /// Unpatched `break` jumps, keyed by the start offset of their loop.
    pending_breaks: HashMap<usize, Vec<usize>>,
}

impl EmissionContext {
    /// Create a context for a function taking `argument_count` parameters.
    pub fn new(argument_count: u32) -> Self {
        Self {
            argument_count,
            ..Self::default()
        }
    }

    // ========================================================================
    // Slots and scopes
    // ========================================================================

    /// Allocate a slot for `name`, reusing one freed by a closed scope.
    pub fn declare(&mut self, name: &str) -> Result<u32> {
        let slot = self.first_free_index;
        if slot >= MAX_LOCALS as usize {
            return Err(CompileError::TooMany("local variables"));
        }
        if slot < self.variables.len() {
            self.variables[slot] = name.to_string();
        } else {
            self.variables.push(name.to_string());
        }
        self.first_free_index += 1;
        self.high_water = self.high_water.max(self.first_free_index);
        parameter(slot, "local variables")
    }

    /// Slot of the innermost visible declaration of `name`.
    pub fn declaration_index(&self, name: &str) -> Option<u32> {
        self.variables[..self.first_free_index]
            .iter()
            .rposition(|declared| declared == name)
            .map(|slot| slot as u32)
    }

    pub fn push_scope(&mut self) {
        self.scope_starts.push(self.first_free_index);
    }

    /// Close the innermost scope, freeing its slots for later siblings.
    pub fn pop_scope(&mut self) -> Result<()> {
        self.first_free_index = self
            .scope_starts
            .pop()
            .ok_or_else(|| CompileError::Internal("popped scope stack is empty".into()))?;
        Ok(())
    }

    pub fn locals_count(&self) -> usize {
        self.high_water
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// Append an instruction and return its offset.
    pub fn emit(&mut self, op: OpCode, parameter: u32) -> usize {
        self.instructions.push(Instruction::new(op, parameter));
        self.instructions.len() - 1
    }

    /// Append an instruction whose parameter is unused.
    pub fn emit_op(&mut self, op: OpCode) -> usize {
        self.emit(op, 0)
    }

    /// Emit a jump with a placeholder target, to be patched later.
    pub fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op, 0)
    }

    /// Offset the next instruction will be emitted at.
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    /// Overwrite the target of the jump at `offset`.
    pub fn update_parameter_at(&mut self, offset: usize, target: usize) -> Result<()> {
        let target = parameter(target, "instructions")?;
        match self.instructions.get_mut(offset) {
            Some(instruction) if instruction.op.is_jump() => {
                instruction.parameter = target;
                Ok(())
            }
            Some(instruction) => Err(CompileError::Internal(format!(
                "patch target {} is {}, not a jump",
                offset, instruction.op
            ))),
            None => Err(CompileError::Internal(format!(
                "patch target {} was never emitted",
                offset
            ))),
        }
    }

    /// Point the jump at `offset` to the current offset.
    pub fn patch_jump(&mut self, offset: usize) -> Result<()> {
        let target = self.current_offset();
        self.update_parameter_at(offset, target)
    }

    // ========================================================================
    // Loops
    // ========================================================================

    pub fn enter_loop(&mut self, start: usize) {
        self.loop_starts.push(start);
        self.pending_breaks.entry(start).or_default();
    }

    /// Record a `break` jump against the innermost loop.
    pub fn register_break(&mut self, offset: usize) -> Result<()> {
        let start = *self
            .loop_starts
            .last()
            .ok_or_else(|| CompileError::Internal("break outside of a loop".into()))?;
        self.pending_breaks.entry(start).or_default().push(offset);
        Ok(())
    }

    /// Close the innermost loop, returning its break sites.
    pub fn exit_loop(&mut self) -> Result<Vec<usize>> {
        let start = self
            .loop_starts
            .pop()
            .ok_or_else(|| CompileError::Internal("loop stack is empty".into()))?;
        Ok(self.pending_breaks.remove(&start).unwrap_or_default())
    }

    // ========================================================================
    // Captures
    // ========================================================================

    /// Index of `capture` in the capture table, adding it if new.
    pub fn capture_index(&mut self, capture: Capture) -> Result<u32> {
        let index = match self.captures.iter().position(|c| *c == capture) {
            Some(index) => index,
            None => {
                self.captures.push(capture);
                self.captures.len() - 1
            }
        };
        parameter(index, "captures")
    }

    /// Freeze the context into a function prototype.
    pub fn finish(self) -> Result<FunctionPrototype> {
        if !self.scope_starts.is_empty() || !self.loop_starts.is_empty() {
            return Err(CompileError::Internal(
                "function finished with open scopes or loops".into(),
            ));
        }
        Ok(FunctionPrototype::new(
            self.argument_count,
            parameter(self.high_water, "local variables")?,
            self.captures,
            self.instructions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_scopes_reuse_slots() {
        let mut ctx = EmissionContext::new(0);
        ctx.push_scope();
        let a = ctx.declare("a").unwrap();
        ctx.pop_scope().unwrap();
        ctx.push_scope();
        let b = ctx.declare("b").unwrap();
        ctx.pop_scope().unwrap();
        assert_eq!(a, b);
        assert_eq!(ctx.locals_count(), 1);
    }

    #[test]
    fn test_same_scope_gets_distinct_slots() {
        let mut ctx = EmissionContext::new(0);
        ctx.push_scope();
        let a = ctx.declare("a").unwrap();
        let b = ctx.declare("b").unwrap();
        ctx.pop_scope().unwrap();
        assert_ne!(a, b);
        assert_eq!(ctx.locals_count(), 2);
    }

    #[test]
    fn test_shadowing_and_unshadowing() {
        let mut ctx = EmissionContext::new(0);
        let outer = ctx.declare("x").unwrap();
        ctx.push_scope();
        let inner = ctx.declare("x").unwrap();
        assert_eq!(ctx.declaration_index("x"), Some(inner));
        ctx.pop_scope().unwrap();
        assert_eq!(ctx.declaration_index("x"), Some(outer));
        assert_ne!(outer, inner);
    }

    #[test]
    fn test_closed_scope_names_are_invisible() {
        let mut ctx = EmissionContext::new(0);
        ctx.push_scope();
        ctx.declare("gone").unwrap();
        ctx.pop_scope().unwrap();
        assert_eq!(ctx.declaration_index("gone"), None);
    }

    #[test]
    fn test_frame_size_is_bounded() {
        let mut ctx = EmissionContext::new(0);
        for _ in 0..MAX_LOCALS {
            ctx.declare("v").unwrap();
        }
        assert_eq!(
            ctx.declare("v"),
            Err(CompileError::TooMany("local variables"))
        );
        assert_eq!(ctx.locals_count(), MAX_LOCALS as usize);
    }

    #[test]
    fn test_pop_empty_scope_stack_fails() {
        let mut ctx = EmissionContext::new(0);
        assert!(matches!(ctx.pop_scope(), Err(CompileError::Internal(_))));
    }

    #[test]
    fn test_patch_jump() {
        let mut ctx = EmissionContext::new(0);
        let jump = ctx.emit_jump(OpCode::JumpIfFalse);
        ctx.emit_op(OpCode::Pop);
        ctx.patch_jump(jump).unwrap();
        let proto = ctx.finish().unwrap();
        assert_eq!(proto.instructions[0], Instruction::new(OpCode::JumpIfFalse, 2));
    }

    #[test]
    fn test_patch_rejects_bad_targets() {
        let mut ctx = EmissionContext::new(0);
        ctx.emit_op(OpCode::Pop);
        assert!(ctx.update_parameter_at(0, 1).is_err());
        assert!(ctx.update_parameter_at(7, 1).is_err());
    }

    #[test]
    fn test_breaks_are_collected_per_loop() {
        let mut ctx = EmissionContext::new(0);
        ctx.enter_loop(0);
        let outer_break = ctx.emit_jump(OpCode::Jump);
        ctx.enter_loop(1);
        let inner_break = ctx.emit_jump(OpCode::Jump);
        ctx.register_break(inner_break).unwrap();
        assert_eq!(ctx.exit_loop().unwrap(), vec![inner_break]);
        ctx.register_break(outer_break).unwrap();
        assert_eq!(ctx.exit_loop().unwrap(), vec![outer_break]);
        assert!(ctx.register_break(5).is_err());
    }

    #[test]
    fn test_captures_are_deduplicated() {
        let mut ctx = EmissionContext::new(0);
        let first = ctx.capture_index(Capture::new(1, 0)).unwrap();
        let second = ctx.capture_index(Capture::new(2, 0)).unwrap();
        let again = ctx.capture_index(Capture::new(1, 0)).unwrap();
        assert_eq!((first, second, again), (0, 1, 0));
    }

    #[test]
    fn test_finish_with_open_scope_fails() {
        let mut ctx = EmissionContext::new(0);
        ctx.push_scope();
        assert!(ctx.finish().is_err());
    }
}
