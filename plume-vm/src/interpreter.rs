// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The whole pipeline: parse, analyse, compile, execute.

use std::io::{BufRead, Write};

use plume_parser::{ParseError, Parser};
use thiserror::Error;
use tracing::debug;

use crate::bytecode::{self, DecodeError};
use crate::compiler::{self, CompileError, SemanticErrors};
use crate::program::CompiledProgram;
use crate::vm::{RuntimeError, VM, VmOptions};

/// Anything that can stop a program from running to completion.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Semantic(#[from] SemanticErrors),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    /// Was the program rejected before it started executing?
    pub fn is_frontend(&self) -> bool {
        !matches!(self, InterpretError::Runtime(_))
    }
}

pub type Result<T> = std::result::Result<T, InterpretError>;

/// Parse, analyse and compile source text.
pub fn compile_source(source: &str) -> Result<CompiledProgram> {
    let script = Parser::parse_str(source)?;
    debug!(statements = script.body.len(), "parsed");
    compiler::analyse(&script)?;
    let program = compiler::compile(&script)?;
    debug!(
        functions = program.functions.len(),
        integers = program.integers.len(),
        floats = program.floats.len(),
        strings = program.strings.len(),
        "compiled"
    );
    Ok(program)
}

/// Runs Plume programs against a pair of I/O sinks.
pub struct Interpreter<'a> {
    out: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
    options: VmOptions,
}

impl<'a> Interpreter<'a> {
    pub fn new(out: &'a mut dyn Write, input: &'a mut dyn BufRead) -> Self {
        Self::with_options(out, input, VmOptions::default())
    }

    pub fn with_options(
        out: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
        options: VmOptions,
    ) -> Self {
        Self {
            out,
            input,
            options,
        }
    }

    /// Compile and run source text.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let program = compile_source(source)?;
        self.run_program(&program)
    }

    /// Decode and run a `.plmb` program.
    pub fn run_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let program = bytecode::decode(bytes)?;
        self.run_program(&program)
    }

    /// Run an already compiled program.
    pub fn run_program(&mut self, program: &CompiledProgram) -> Result<()> {
        let mut vm = VM::with_options(
            program,
            &mut *self.out,
            &mut *self.input,
            self.options.clone(),
        );
        vm.run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (Result<()>, String) {
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let result = Interpreter::new(&mut out, &mut input).run(source);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_hello() {
        let (result, out) = run(r#"print("hello");"#);
        assert!(result.is_ok());
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_frontend_errors() {
        let (result, out) = run("print(");
        assert!(matches!(result, Err(InterpretError::Parse(_))));
        assert!(result.unwrap_err().is_frontend());
        assert!(out.is_empty());

        let (result, _) = run("print(x);");
        assert!(matches!(result, Err(InterpretError::Semantic(ref e)) if e.len() == 1));
    }

    #[test]
    fn test_run_bytes() {
        let program = compile_source("print(add(40, 2));").unwrap();
        let bytes = bytecode::encode(&program);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        Interpreter::new(&mut out, &mut input)
            .run_bytes(&bytes)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42\n");

        let mut out = Vec::new();
        let result = Interpreter::new(&mut out, &mut input).run_bytes(b"nope");
        assert!(matches!(result, Err(InterpretError::Decode(DecodeError::BadMagic))));
    }

    #[test]
    fn test_run_bytes_rejects_oversized_frame() {
        let mut program = compile_source("print(1);").unwrap();
        program.entry.locals_count = u32::MAX;
        let bytes = bytecode::encode(&program);
        let mut out = Vec::new();
        let mut input = std::io::empty();
        let result = Interpreter::new(&mut out, &mut input).run_bytes(&bytes);
        assert!(matches!(
            result,
            Err(InterpretError::Decode(DecodeError::InvalidFunction { .. }))
        ));
        assert!(out.is_empty());
    }
}
