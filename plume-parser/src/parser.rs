// plume-parser - Parser for Plume
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Recursive descent parser for Plume source code.
//!
//! Converts tokens into a [`Script`] syntax tree. The first error aborts the
//! parse.

use thiserror::Error;

use crate::ast::{Expr, Ident, Literal, Script, Stmt};
use crate::lexer::{Lexer, LexerError, Span, Token};

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error at {span}: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl From<LexerError> for ParseError {
    fn from(e: LexerError) -> Self {
        ParseError {
            message: e.message,
            span: e.span,
        }
    }
}

/// The parser converts tokens into statements.
///
/// Keeps one token of lookahead beyond `current`, which is enough to tell an
/// assignment (`x = ...`) from an expression statement starting with `x`.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    span: Span,
    next: Token,
    next_span: Span,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given source code.
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let (current, span) = lexer.next_token()?;
        let (next, next_span) = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            span,
            next,
            next_span,
        })
    }

    /// Parse the whole source as a script.
    pub fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut body = Vec::new();
        while !matches!(self.current, Token::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Script { body })
    }

    /// Parse a string as a script (convenience function).
    pub fn parse_str(source: &str) -> Result<Script, ParseError> {
        Parser::new(source)?.parse_script()
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn advance(&mut self) -> Result<(Token, Span), ParseError> {
        let (following, following_span) = self.lexer.next_token()?;
        let next = std::mem::replace(&mut self.next, following);
        let next_span = std::mem::replace(&mut self.next_span, following_span);
        let prev = std::mem::replace(&mut self.current, next);
        let prev_span = std::mem::replace(&mut self.span, next_span);
        Ok((prev, prev_span))
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.span,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, ParseError> {
        if &self.current == expected {
            let (_, span) = self.advance()?;
            Ok(span)
        } else {
            Err(self.error(format!("Expected '{}', found '{}'", expected, self.current)))
        }
    }

    fn expect_identifier(&mut self) -> Result<Ident, ParseError> {
        match &self.current {
            Token::Identifier(_) => match self.advance()? {
                (Token::Identifier(name), span) => Ok(Ident::new(name, span)),
                (other, span) => Err(ParseError {
                    message: format!("Expected identifier, found '{}'", other),
                    span,
                }),
            },
            other => Err(self.error(format!("Expected identifier, found '{}'", other))),
        }
    }

    /// Parse `open item (, item)* close`, allowing an empty list.
    fn parse_delimited<T>(
        &mut self,
        close: &Token,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        if &self.current == close {
            self.advance()?;
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.current == Token::Comma {
                self.advance()?;
            } else {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match &self.current {
            Token::Var => self.parse_declare(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::Break => {
                let (_, span) = self.advance()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Break { span })
            }
            Token::Return => self.parse_return(),
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Identifier(_) if self.next == Token::Assign => {
                let name = self.expect_identifier()?;
                self.expect(&Token::Assign)?;
                let value = self.parse_expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_declare(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::Var)?;
        let name = self.expect_identifier()?;
        self.expect(&Token::Assign)?;
        let init = self.parse_expression()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::Declare { name, init })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.current == Token::Else {
            self.advance()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let span = self.expect(&Token::Return)?;
        if self.current == Token::Semicolon {
            self.advance()?;
            return Ok(Stmt::Return { value: None, span });
        }
        let value = self.parse_expression()?;
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::Return {
            value: Some(value),
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while self.current != Token::RBrace {
            if self.current == Token::Eof {
                return Err(self.error("Unexpected end of file, expected '}'".to_string()));
            }
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(body)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        match &self.current {
            Token::LBrace => self.parse_object(),
            Token::Function => self.parse_function(),
            Token::Undefined => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Undefined))
            }
            Token::True => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            Token::Int(_) | Token::Float(_) | Token::String(_) => {
                let literal = match self.advance()?.0 {
                    Token::Int(n) => Literal::Integer(n),
                    Token::Float(n) => Literal::Float(n),
                    Token::String(s) => Literal::String(s),
                    _ => Literal::Undefined,
                };
                Ok(Expr::Literal(literal))
            }
            Token::Builtin(builtin) => {
                let builtin = *builtin;
                let (_, span) = self.advance()?;
                self.expect(&Token::LParen)?;
                let args = self.parse_delimited(&Token::RParen, Self::parse_expression)?;
                Ok(Expr::Builtin {
                    builtin,
                    args,
                    span,
                })
            }
            Token::Identifier(_) => {
                let ident = self.expect_identifier()?;
                if self.current == Token::LParen {
                    self.advance()?;
                    let args = self.parse_delimited(&Token::RParen, Self::parse_expression)?;
                    Ok(Expr::Call {
                        callee: ident,
                        args,
                    })
                } else {
                    Ok(Expr::Identifier(ident))
                }
            }
            other => Err(self.error(format!("Expected expression, found '{}'", other))),
        }
    }

    fn parse_function(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::Function)?;
        self.expect(&Token::LParen)?;
        let params = self.parse_delimited(&Token::RParen, Self::expect_identifier)?;
        let body = self.parse_block()?;
        Ok(Expr::Function { params, body })
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LBrace)?;
        let properties = self.parse_delimited(&Token::RBrace, |p| {
            let key = p.expect_identifier()?;
            p.expect(&Token::Colon)?;
            let value = p.parse_expression()?;
            Ok((key, value))
        })?;
        Ok(Expr::Object(properties))
    }
}
