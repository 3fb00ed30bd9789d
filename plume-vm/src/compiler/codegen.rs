// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Code generation: transforms an analysed script to bytecode.
//!
//! A single depth-first walk emits straight into the innermost
//! [`EmissionContext`]. Function literals push a new context; the stack of
//! contexts doubles as the lexical parent chain used to resolve captures.

use indexmap::IndexSet;
use plume_parser::{Expr, Ident, Literal, Script, Stmt};
use tracing::debug;

use crate::opcode::OpCode;
use crate::program::{Capture, CompiledProgram, FunctionPrototype, ObjectShape};

use super::emit::EmissionContext;
use super::types::{CompileError, Result, parameter};

/// The AST compiler.
#[derive(Debug)]
pub struct Compiler {
    /// Open emission contexts; the last one is being emitted into.
    contexts: Vec<EmissionContext>,

    functions: Vec<FunctionPrototype>,
    shapes: Vec<ObjectShape>,
    integers: IndexSet<i64>,
    /// Floats are keyed by bit pattern so `-0.0`, `0.0` and NaNs stay distinct.
    floats: IndexSet<u64>,
    strings: IndexSet<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            contexts: Vec::new(),
            functions: Vec::new(),
            shapes: Vec::new(),
            integers: IndexSet::new(),
            floats: IndexSet::new(),
            strings: IndexSet::new(),
        }
    }

    /// Compile a validated script into a program.
    pub fn compile(mut self, script: &Script) -> Result<CompiledProgram> {
        self.contexts.push(EmissionContext::new(0));
        for stmt in &script.body {
            self.compile_stmt(stmt)?;
        }
        self.ctx()?.emit_op(OpCode::Halt);

        let entry = self.pop_context()?.finish()?;
        if !self.contexts.is_empty() {
            return Err(CompileError::Internal(
                "emission contexts left open after the script".into(),
            ));
        }
        debug!(
            functions = self.functions.len(),
            integers = self.integers.len(),
            floats = self.floats.len(),
            strings = self.strings.len(),
            shapes = self.shapes.len(),
            "compiled program"
        );

        Ok(CompiledProgram {
            entry,
            functions: self.functions,
            shapes: self.shapes,
            integers: self.integers.into_iter().collect(),
            floats: self.floats.into_iter().map(f64::from_bits).collect(),
            strings: self.strings.into_iter().collect(),
        })
    }

    // ========================================================================
    // Contexts
    // ========================================================================

    fn ctx(&mut self) -> Result<&mut EmissionContext> {
        self.contexts
            .last_mut()
            .ok_or_else(|| CompileError::Internal("no open emission context".into()))
    }

    fn pop_context(&mut self) -> Result<EmissionContext> {
        self.contexts
            .pop()
            .ok_or_else(|| CompileError::Internal("no open emission context".into()))
    }

    /// Emit the load of a name: `LoadLocal` when it lives in the current
    /// function, otherwise a capture of the enclosing function `depth` levels
    /// out and `LoadClosure`.
    fn load_name(&mut self, ident: &Ident) -> Result<()> {
        let current = self.contexts.len().saturating_sub(1);
        let ctx = self.ctx()?;
        if let Some(slot) = ctx.declaration_index(&ident.name) {
            ctx.emit(OpCode::LoadLocal, slot);
            return Ok(());
        }

        for depth in 1..=current {
            let Some(slot) = self.contexts[current - depth].declaration_index(&ident.name) else {
                continue;
            };
            let capture = Capture::new(parameter(depth, "nested functions")?, slot);
            let ctx = self.ctx()?;
            let index = ctx.capture_index(capture)?;
            ctx.emit(OpCode::LoadClosure, index);
            return Ok(());
        }

        Err(CompileError::Internal(format!(
            "unresolved name '{}' at {}",
            ident.name, ident.span
        )))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Declare { name, init } => {
                self.compile_expr(init)?;
                let ctx = self.ctx()?;
                let slot = ctx.declare(&name.name)?;
                ctx.emit(OpCode::SetLocal, slot);
            }
            Stmt::Assign { name, value } => {
                self.compile_expr(value)?;
                let ctx = self.ctx()?;
                let slot = ctx.declaration_index(&name.name).ok_or_else(|| {
                    CompileError::Internal(format!(
                        "assignment to '{}' has no local slot at {}",
                        name.name, name.span
                    ))
                })?;
                ctx.emit(OpCode::SetLocal, slot);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expr(condition)?;
                let else_jump = self.ctx()?.emit_jump(OpCode::JumpIfFalse);
                self.compile_stmt(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let end_jump = self.ctx()?.emit_jump(OpCode::Jump);
                        self.ctx()?.patch_jump(else_jump)?;
                        self.compile_stmt(else_branch)?;
                        self.ctx()?.patch_jump(end_jump)?;
                    }
                    None => self.ctx()?.patch_jump(else_jump)?,
                }
            }
            Stmt::While { condition, body } => {
                let ctx = self.ctx()?;
                let loop_start = ctx.current_offset();
                ctx.enter_loop(loop_start);

                self.compile_expr(condition)?;
                let exit_jump = self.ctx()?.emit_jump(OpCode::JumpIfFalse);
                self.compile_stmt(body)?;

                let ctx = self.ctx()?;
                ctx.emit(OpCode::Jump, parameter(loop_start, "instructions")?);
                ctx.patch_jump(exit_jump)?;
                for break_jump in ctx.exit_loop()? {
                    ctx.patch_jump(break_jump)?;
                }
            }
            Stmt::Break { .. } => {
                let ctx = self.ctx()?;
                let jump = ctx.emit_jump(OpCode::Jump);
                ctx.register_break(jump)?;
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => {
                        self.ctx()?.emit_op(OpCode::LoadUndefinedConstant);
                    }
                }
                self.ctx()?.emit_op(OpCode::Return);
            }
            Stmt::Block(body) => {
                self.ctx()?.push_scope();
                for stmt in body {
                    self.compile_stmt(stmt)?;
                }
                self.ctx()?.pop_scope()?;
            }
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.ctx()?.emit_op(OpCode::Pop);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(literal) => self.compile_literal(literal)?,
            Expr::Identifier(ident) => self.load_name(ident)?,
            Expr::Call { callee, args } => {
                self.load_name(callee)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let argc = parameter(args.len(), "arguments")?;
                self.ctx()?.emit(OpCode::Invoke, argc);
            }
            Expr::Builtin { builtin, args, .. } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.ctx()?.emit_op(OpCode::for_builtin(*builtin));
            }
            Expr::Function { params, body } => self.compile_function(params, body)?,
            Expr::Object(properties) => {
                for (_, value) in properties {
                    self.compile_expr(value)?;
                }
                let index = parameter(self.shapes.len(), "object shapes")?;
                self.shapes.push(ObjectShape {
                    keys: properties.iter().map(|(key, _)| key.name.clone()).collect(),
                });
                self.ctx()?.emit(OpCode::MakeObj, index);
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, literal: &Literal) -> Result<()> {
        let (op, index) = match literal {
            Literal::Undefined => (OpCode::LoadUndefinedConstant, 0),
            Literal::Boolean(true) => (OpCode::LoadBooleanTrueConstant, 0),
            Literal::Boolean(false) => (OpCode::LoadBooleanFalseConstant, 0),
            Literal::Integer(n) => (
                OpCode::LoadIntegerConstant,
                self.integers.insert_full(*n).0,
            ),
            Literal::Float(n) => (
                OpCode::LoadFloatConstant,
                self.floats.insert_full(n.to_bits()).0,
            ),
            Literal::String(s) => {
                let index = match self.strings.get_index_of(s.as_str()) {
                    Some(index) => index,
                    None => self.strings.insert_full(s.clone()).0,
                };
                (OpCode::LoadStringConstant, index)
            }
        };
        let index = parameter(index, "constants")?;
        self.ctx()?.emit(op, index);
        Ok(())
    }

    fn compile_function(&mut self, params: &[Ident], body: &[Stmt]) -> Result<()> {
        let mut ctx = EmissionContext::new(parameter(params.len(), "parameters")?);
        for param in params {
            ctx.declare(&param.name)?;
        }
        self.contexts.push(ctx);

        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        // Falling off the end returns undefined.
        let ctx = self.ctx()?;
        ctx.emit_op(OpCode::LoadUndefinedConstant);
        ctx.emit_op(OpCode::Return);

        let prototype = self.pop_context()?.finish()?;
        let index = parameter(self.functions.len(), "functions")?;
        debug!(
            function = index,
            arguments = prototype.argument_count,
            locals = prototype.locals_count,
            captures = prototype.captures.len(),
            "compiled function"
        );
        self.functions.push(prototype);
        self.ctx()?.emit(OpCode::MakeFn, index);
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a validated script (convenience function).
pub fn compile(script: &Script) -> Result<CompiledProgram> {
    Compiler::new().compile(script)
}
