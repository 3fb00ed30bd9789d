// plume-parser - Lexer and parser for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # plume-parser
//!
//! Lexer and parser for the Plume scripting language.
//! Produces a [`Script`] syntax tree from source code strings.

pub mod ast;
pub mod builtin;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, Ident, Literal, Script, Stmt};
pub use builtin::Builtin;
pub use lexer::{Lexer, LexerError, Span, Token};
pub use parser::{ParseError, Parser};
