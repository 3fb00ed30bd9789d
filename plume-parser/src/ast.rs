// plume-parser - Syntax tree for Plume
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Abstract syntax tree produced by the parser.
//!
//! Statements and expressions are closed enums; consumers match them
//! exhaustively.

use crate::builtin::Builtin;
use crate::lexer::Span;

/// A whole source file: an ordered list of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub body: Vec<Stmt>,
}

/// A name together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `var name = init;`
    Declare { name: Ident, init: Expr },
    /// `name = value;`
    Assign { name: Ident, value: Expr },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { condition: Expr, body: Box<Stmt> },
    Break { span: Span },
    Return { value: Option<Expr>, span: Span },
    Block(Vec<Stmt>),
    /// An expression evaluated for its effect; the result is discarded.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(Ident),
    /// Call of a user function held in a variable.
    Call { callee: Ident, args: Vec<Expr> },
    Builtin {
        builtin: Builtin,
        args: Vec<Expr>,
        span: Span,
    },
    Function { params: Vec<Ident>, body: Vec<Stmt> },
    /// Object literal; keys keep their source order.
    Object(Vec<(Ident, Expr)>),
}
