// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Semantic analysis pass.
//!
//! One walk over the syntax tree with a scope chain that mirrors the code
//! generator's rules (blocks and function bodies open scopes, parameters live
//! in the function scope). It reports:
//! 1. Use of an undeclared name, including a `var` read in its own initializer
//! 2. Duplicate declarations within one scope
//! 3. `break` outside a loop, and `return` outside a function
//! 4. Assignment to a variable of an enclosing function
//! 5. Built-in calls with the wrong number of arguments
//!
//! A script that passes compiles without internal errors.

use std::collections::HashSet;

use plume_parser::{Expr, Ident, Script, Stmt};
use tracing::debug;

use super::types::{SemanticError, SemanticErrors};

/// Scopes of one function body, innermost last.
#[derive(Debug, Default)]
struct FunctionScope {
    scopes: Vec<HashSet<String>>,
    loop_depth: usize,
}

/// Where a name resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Declared in the function being analysed.
    Local,
    /// Declared in an enclosing function.
    Captured,
}

/// The semantic analyser.
#[derive(Debug)]
pub struct Analyser {
    /// Function nesting, the top-level script first.
    functions: Vec<FunctionScope>,
    errors: Vec<SemanticError>,
}

impl Analyser {
    pub fn new() -> Self {
        Self {
            functions: vec![FunctionScope {
                scopes: vec![HashSet::new()],
                loop_depth: 0,
            }],
            errors: Vec::new(),
        }
    }

    /// Check a whole script, returning every finding.
    pub fn analyse(mut self, script: &Script) -> Result<(), SemanticErrors> {
        for stmt in &script.body {
            self.statement(stmt);
        }
        debug!(findings = self.errors.len(), "semantic analysis finished");
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SemanticErrors(self.errors))
        }
    }

    // ========================================================================
    // Scope chain
    // ========================================================================

    fn function(&mut self) -> &mut FunctionScope {
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    fn push_scope(&mut self) {
        self.function().scopes.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.function().scopes.pop();
    }

    fn declare(&mut self, ident: &Ident) {
        let scope = self.function().scopes.last_mut();
        let fresh = match scope {
            Some(scope) => scope.insert(ident.name.clone()),
            None => true,
        };
        if !fresh {
            self.error(
                format!("'{}' is already declared in this scope", ident.name),
                ident,
            );
        }
    }

    fn resolve(&self, name: &str) -> Option<Resolution> {
        let innermost = self.functions.len() - 1;
        for (level, function) in self.functions.iter().enumerate().rev() {
            if function.scopes.iter().any(|scope| scope.contains(name)) {
                return Some(if level == innermost {
                    Resolution::Local
                } else {
                    Resolution::Captured
                });
            }
        }
        None
    }

    fn error(&mut self, message: String, ident: &Ident) {
        self.errors.push(SemanticError::new(message, ident.span));
    }

    fn use_name(&mut self, ident: &Ident) {
        if self.resolve(&ident.name).is_none() {
            self.error(format!("'{}' is not declared", ident.name), ident);
        }
    }

    // ========================================================================
    // Tree walk
    // ========================================================================

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declare { name, init } => {
                // The name is not visible inside its own initializer.
                self.expression(init);
                self.declare(name);
            }
            Stmt::Assign { name, value } => {
                self.expression(value);
                match self.resolve(&name.name) {
                    Some(Resolution::Local) => {}
                    Some(Resolution::Captured) => self.error(
                        format!(
                            "cannot assign to '{}', which belongs to an enclosing function",
                            name.name
                        ),
                        name,
                    ),
                    None => self.error(format!("'{}' is not declared", name.name), name),
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition);
                self.statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.expression(condition);
                self.function().loop_depth += 1;
                self.statement(body);
                self.function().loop_depth -= 1;
            }
            Stmt::Break { span } => {
                if self.function().loop_depth == 0 {
                    self.errors
                        .push(SemanticError::new("'break' outside of a loop", *span));
                }
            }
            Stmt::Return { value, span } => {
                if let Some(value) = value {
                    self.expression(value);
                }
                if self.functions.len() == 1 {
                    self.errors
                        .push(SemanticError::new("'return' outside of a function", *span));
                }
            }
            Stmt::Block(body) => {
                self.push_scope();
                for stmt in body {
                    self.statement(stmt);
                }
                self.pop_scope();
            }
            Stmt::Expr(expr) => self.expression(expr),
        }
    }

    fn expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Identifier(ident) => self.use_name(ident),
            Expr::Call { callee, args } => {
                self.use_name(callee);
                for arg in args {
                    self.expression(arg);
                }
            }
            Expr::Builtin {
                builtin,
                args,
                span,
            } => {
                if args.len() != builtin.arity() {
                    self.errors.push(SemanticError::new(
                        format!(
                            "'{}' takes {} argument(s), got {}",
                            builtin,
                            builtin.arity(),
                            args.len()
                        ),
                        *span,
                    ));
                }
                for arg in args {
                    self.expression(arg);
                }
            }
            Expr::Function { params, body } => {
                self.functions.push(FunctionScope {
                    scopes: vec![HashSet::new()],
                    loop_depth: 0,
                });
                for param in params {
                    self.declare(param);
                }
                for stmt in body {
                    self.statement(stmt);
                }
                self.functions.pop();
            }
            Expr::Object(properties) => {
                for (_, value) in properties {
                    self.expression(value);
                }
            }
        }
    }
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyse a script (convenience function).
pub fn analyse(script: &Script) -> Result<(), SemanticErrors> {
    Analyser::new().analyse(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_parser::Parser;

    fn check(source: &str) -> Result<(), SemanticErrors> {
        analyse(&Parser::parse_str(source).unwrap())
    }

    fn messages(source: &str) -> Vec<String> {
        match check(source) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.message.clone()).collect(),
        }
    }

    #[test]
    fn test_valid_program() {
        let source = r#"
            var make = function(x) { return function() { return x; }; };
            var i = 0;
            while (less(i, 3)) { i = add(i, 1); if (equal(i, 2)) { break; } }
            { var i = 5; print(i); }
            var f = make(1);
            print(f());
        "#;
        assert_eq!(check(source), Ok(()));
    }

    #[test]
    fn test_undeclared_use() {
        assert_eq!(messages("print(y);"), vec!["'y' is not declared"]);
        assert_eq!(messages("y = 1;"), vec!["'y' is not declared"]);
        assert_eq!(messages("f();"), vec!["'f' is not declared"]);
    }

    #[test]
    fn test_self_reference_in_initializer() {
        assert_eq!(messages("var x = x;"), vec!["'x' is not declared"]);
        let found = messages("var f = function() { return f(); };");
        assert_eq!(found, vec!["'f' is not declared"]);
    }

    #[test]
    fn test_block_scoped_names_expire() {
        assert_eq!(messages("{ var a = 1; } print(a);"), vec!["'a' is not declared"]);
    }

    #[test]
    fn test_duplicate_declaration() {
        assert_eq!(
            messages("var a = 1; var a = 2;"),
            vec!["'a' is already declared in this scope"]
        );
        assert_eq!(
            messages("var f = function(a, a) { };"),
            vec!["'a' is already declared in this scope"]
        );
        assert_eq!(
            messages("var f = function(a) { var a = 1; };"),
            vec!["'a' is already declared in this scope"]
        );
        // Shadowing in a nested block is fine.
        assert_eq!(messages("var a = 1; { var a = 2; }"), Vec::<String>::new());
    }

    #[test]
    fn test_break_and_return_placement() {
        assert_eq!(messages("break;"), vec!["'break' outside of a loop"]);
        assert_eq!(messages("return 1;"), vec!["'return' outside of a function"]);
        assert_eq!(
            messages("while (true) { var f = function() { break; }; }"),
            vec!["'break' outside of a loop"]
        );
    }

    #[test]
    fn test_assignment_to_enclosing_function_variable() {
        let found = messages("var x = 1; var f = function() { x = 2; };");
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("enclosing function"));
        // Reading it is a capture and is allowed.
        assert_eq!(
            messages("var x = 1; var f = function() { return x; };"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_builtin_arity() {
        let found = messages("print(add(1));");
        assert_eq!(found, vec!["'add' takes 2 argument(s), got 1"]);
        assert_eq!(messages("read();"), Vec::<String>::new());
    }

    #[test]
    fn test_all_findings_are_collected() {
        let errors = check("print(a); break; var b = 1; var b = 2;").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.to_string().contains("Semantic error at 1:7"));
    }
}
