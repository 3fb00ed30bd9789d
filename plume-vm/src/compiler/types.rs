// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared types for the bytecode compiler.

use std::fmt;

use plume_parser::Span;
use thiserror::Error;

/// Error during compilation.
///
/// A validated script never produces these; they signal a compiler bug or a
/// program too large for the instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A table outgrew the 32-bit instruction parameter.
    #[error("Too many {0} for one program")]
    TooMany(&'static str),
    /// A compiler-internal invariant was broken.
    #[error("Internal compiler error: {0}")]
    Internal(String),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// A problem found by semantic analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Semantic error at {span}: {message}")]
pub struct SemanticError {
    pub message: String,
    pub span: Span,
}

impl SemanticError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Every finding of one analysis pass, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SemanticErrors(pub Vec<SemanticError>);

impl SemanticErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, SemanticError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SemanticErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for SemanticErrors {}

/// Convert a table index to an instruction parameter.
pub(crate) fn parameter(index: usize, what: &'static str) -> Result<u32> {
    u32::try_from(index).map_err(|_| CompileError::TooMany(what))
}
