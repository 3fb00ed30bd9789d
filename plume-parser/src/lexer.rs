// plume-parser - Lexer for Plume
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for Plume source code.
//!
//! Converts a source string into a stream of positioned tokens.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::builtin::Builtin;

/// A 1-indexed source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Delimiters
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    Semicolon, // ;
    Comma,     // ,
    Assign,    // =
    Colon,     // :

    // Keywords
    Function,
    Return,
    Break,
    If,
    Else,
    While,
    Var,

    // Literals
    True,
    False,
    Undefined,
    Int(i64),
    Float(f64),
    String(String),

    Identifier(String),
    Builtin(Builtin),

    // Special
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::Assign => write!(f, "="),
            Token::Colon => write!(f, ":"),
            Token::Function => write!(f, "function"),
            Token::Return => write!(f, "return"),
            Token::Break => write!(f, "break"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Var => write!(f, "var"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Undefined => write!(f, "undefined"),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{:?}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Builtin(b) => write!(f, "{}", b),
            Token::Eof => write!(f, "end of file"),
        }
    }
}

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexer error at {span}: {message}")]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

/// The lexer converts source code into tokens.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token and the position it starts at.
    pub fn next_token(&mut self) -> Result<(Token, Span), LexerError> {
        self.skip_whitespace_and_comments();

        let span = self.span();
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok((Token::Eof, span)),
        };

        let token = match c {
            '{' | '}' | '(' | ')' | ';' | ',' | '=' | ':' => {
                self.advance();
                match c {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ';' => Token::Semicolon,
                    ',' => Token::Comma,
                    '=' => Token::Assign,
                    _ => Token::Colon,
                }
            }
            '"' => self.read_string(span)?,
            '0'..='9' => self.read_number(span)?,
            _ if is_identifier_start(c) => self.read_word(),
            _ => {
                return Err(LexerError {
                    message: format!("Unexpected character: '{}'", c),
                    span,
                });
            }
        };

        Ok((token, span))
    }

    /// Collect all tokens (excluding the final `Eof`) into a vector.
    pub fn tokenize(&mut self) -> Result<Vec<(Token, Span)>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let (token, span) = self.next_token()?;
            if matches!(token, Token::Eof) {
                break;
            }
            tokens.push((token, span));
        }
        Ok(tokens)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self, start: Span) -> Result<Token, LexerError> {
        self.advance(); // consume opening "
        let mut s = String::new();

        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some(c) => {
                        return Err(LexerError {
                            message: format!("Unknown escape sequence: \\{}", c),
                            span: self.span(),
                        });
                    }
                    None => {
                        return Err(LexerError {
                            message: "Unterminated string escape".to_string(),
                            span: start,
                        });
                    }
                },
                Some('\n') | Some('\r') | None => {
                    return Err(LexerError {
                        message: "Unterminated string".to_string(),
                        span: start,
                    });
                }
                Some(c) => s.push(c),
            }
        }

        Ok(Token::String(s))
    }

    fn read_number(&mut self, start: Span) -> Result<Token, LexerError> {
        let mut digits = String::new();

        // A leading zero is a complete integer part on its own.
        if self.peek() == Some('0') {
            digits.push('0');
            self.advance();
        } else {
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                self.advance();
            }
        }

        if self.peek() == Some('.') {
            digits.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                self.advance();
            }
            return digits.parse::<f64>().map(Token::Float).map_err(|_| LexerError {
                message: format!("Invalid float literal: {}", digits),
                span: start,
            });
        }

        digits.parse::<i64>().map(Token::Int).map_err(|_| LexerError {
            message: format!("Integer literal out of range: {}", digits),
            span: start,
        })
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !is_identifier_char(c) {
                break;
            }
            word.push(c);
            self.advance();
        }

        match word.as_str() {
            "function" => Token::Function,
            "return" => Token::Return,
            "break" => Token::Break,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "var" => Token::Var,
            "true" => Token::True,
            "false" => Token::False,
            "undefined" => Token::Undefined,
            _ => match Builtin::from_name(&word) {
                Some(builtin) => Token::Builtin(builtin),
                None => Token::Identifier(word),
            },
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
