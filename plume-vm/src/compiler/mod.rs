// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: transforms a Plume syntax tree to a compiled program.
//!
//! The compiler operates in two phases:
//! 1. Analysis: reject scope and control-flow errors
//! 2. Code generation: emit bytecode through per-function emission contexts

pub mod analysis;
pub mod codegen;
pub mod emit;
pub mod types;

pub use analysis::{Analyser, analyse};
pub use codegen::{Compiler, compile};
pub use emit::EmissionContext;
pub use types::{CompileError, Result, SemanticError, SemanticErrors};
