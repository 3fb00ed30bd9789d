// plume-parser - Built-in function catalogue for Plume
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The fixed catalogue of built-in functions.
//!
//! Built-in names are reserved words: the lexer recognises them as a whole
//! word, so they can never be shadowed by a user declaration.

use std::fmt;

/// A built-in function, callable as `name(args...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Equality and logic
    Equal,
    NotEqual,
    Not,
    And,
    Or,

    // Numeric comparison
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,

    // Objects
    Get,
    Set,

    // I/O
    Read,
    Print,
    Env,

    // Runtime types
    Type,
    Int,
    Float,

    // Strings
    Length,
    CharAt,
    Append,
}

impl Builtin {
    /// Every built-in, in catalogue order.
    pub const ALL: [Builtin; 24] = [
        Builtin::Add,
        Builtin::Subtract,
        Builtin::Multiply,
        Builtin::Divide,
        Builtin::Equal,
        Builtin::NotEqual,
        Builtin::Not,
        Builtin::And,
        Builtin::Or,
        Builtin::Greater,
        Builtin::Less,
        Builtin::GreaterOrEqual,
        Builtin::LessOrEqual,
        Builtin::Get,
        Builtin::Set,
        Builtin::Read,
        Builtin::Print,
        Builtin::Env,
        Builtin::Type,
        Builtin::Int,
        Builtin::Float,
        Builtin::Length,
        Builtin::CharAt,
        Builtin::Append,
    ];

    /// Look up a built-in by its source name.
    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// The name used to call this built-in from source.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Subtract => "subtract",
            Builtin::Multiply => "multiply",
            Builtin::Divide => "divide",
            Builtin::Equal => "equal",
            Builtin::NotEqual => "notEqual",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Greater => "greater",
            Builtin::Less => "less",
            Builtin::GreaterOrEqual => "greaterOrEqual",
            Builtin::LessOrEqual => "lessOrEqual",
            Builtin::Get => "get",
            Builtin::Set => "set",
            Builtin::Read => "read",
            Builtin::Print => "print",
            Builtin::Env => "env",
            Builtin::Type => "type",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Length => "length",
            Builtin::CharAt => "charAt",
            Builtin::Append => "append",
        }
    }

    /// Number of arguments the built-in takes.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Read => 0,
            Builtin::Not
            | Builtin::Print
            | Builtin::Env
            | Builtin::Type
            | Builtin::Int
            | Builtin::Float
            | Builtin::Length => 1,
            Builtin::Set => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("println"), None);
    }

    #[test]
    fn test_arities() {
        assert_eq!(Builtin::Read.arity(), 0);
        assert_eq!(Builtin::Not.arity(), 1);
        assert_eq!(Builtin::Add.arity(), 2);
        assert_eq!(Builtin::CharAt.arity(), 2);
        assert_eq!(Builtin::Set.arity(), 3);
    }
}
