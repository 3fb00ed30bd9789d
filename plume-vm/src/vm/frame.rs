// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames and lexical scopes for the VM.
//!
//! The call stack (`VM::frames`) and the lexical scope chain are separate:
//! a frame returns to whichever frame is below it, while its [`Scope`] links
//! outward to the scope its closure was created in. Captures are resolved
//! along the scope chain only.

use std::cell::RefCell;
use std::rc::Rc;

use crate::program::FunctionId;
use crate::value::{FnRef, Variable};

use super::stack::ValueStack;

/// The local slots of one activation, plus its defining-scope link.
#[derive(Debug)]
pub struct Scope {
    locals: RefCell<Vec<Variable>>,
    outer: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(locals: Vec<Variable>, outer: Option<Rc<Scope>>) -> Self {
        Self {
            locals: RefCell::new(locals),
            outer,
        }
    }

    pub fn get(&self, slot: usize) -> Option<Variable> {
        self.locals.borrow().get(slot).copied()
    }

    /// Store into `slot`; returns false if the slot does not exist.
    pub fn set(&self, slot: usize, value: Variable) -> bool {
        match self.locals.borrow_mut().get_mut(slot) {
            Some(local) => {
                *local = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.locals.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current local values.
    pub fn snapshot(&self) -> Vec<Variable> {
        self.locals.borrow().clone()
    }

    /// The scope this one's closure was defined in.
    pub fn outer(&self) -> Option<&Rc<Scope>> {
        self.outer.as_ref()
    }
}

/// A call frame on the VM's call stack.
#[derive(Debug)]
pub struct CallFrame {
    /// Index of the next instruction to execute.
    pub pc: usize,

    /// The function being executed.
    pub function: FunctionId,

    /// The closure being executed (`None` for the entry function).
    pub closure: Option<FnRef>,

    /// Locals of this activation.
    pub scope: Rc<Scope>,

    pub operands: ValueStack,
}

impl CallFrame {
    /// Create the frame for the top-level script.
    pub fn entry(locals_count: usize) -> Self {
        Self {
            pc: 0,
            function: FunctionId::Entry,
            closure: None,
            scope: Rc::new(Scope::new(vec![Variable::Undefined; locals_count], None)),
            operands: ValueStack::new(),
        }
    }

    /// Create the frame for a closure call.
    pub fn call(function: usize, closure: FnRef, scope: Rc<Scope>) -> Self {
        Self {
            pc: 0,
            function: FunctionId::Table(function),
            closure: Some(closure),
            scope,
            operands: ValueStack::new(),
        }
    }
}
