// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic, comparison and logic opcode handlers.
//!
//! Operands of different variants, or of a non-numeric variant, produce
//! `undefined`. Integer arithmetic wraps; integer division by zero is
//! `undefined`; float arithmetic follows IEEE 754.

use crate::opcode::OpCode;
use crate::value::Variable;
use crate::vm::{Result, RuntimeError, VM};

/// Apply a binary numeric operation to two operands of the same variant.
fn numeric(
    a: Variable,
    b: Variable,
    int_op: impl FnOnce(i64, i64) -> Option<i64>,
    float_op: impl FnOnce(f64, f64) -> f64,
) -> Variable {
    match (a, b) {
        (Variable::Integer(x), Variable::Integer(y)) => {
            int_op(x, y).map_or(Variable::Undefined, Variable::Integer)
        }
        (Variable::Float(x), Variable::Float(y)) => Variable::Float(float_op(x, y)),
        _ => Variable::Undefined,
    }
}

/// Compare two operands of the same numeric variant.
fn compare(
    a: Variable,
    b: Variable,
    int_cmp: impl FnOnce(&i64, &i64) -> bool,
    float_cmp: impl FnOnce(&f64, &f64) -> bool,
) -> Variable {
    match (a, b) {
        (Variable::Integer(x), Variable::Integer(y)) => Variable::Boolean(int_cmp(&x, &y)),
        (Variable::Float(x), Variable::Float(y)) => Variable::Boolean(float_cmp(&x, &y)),
        _ => Variable::Undefined,
    }
}

impl VM<'_> {
    /// Execute an arithmetic, comparison or logic opcode.
    pub(crate) fn execute_arithmetic(&mut self, op: OpCode) -> Result<()> {
        if op == OpCode::Not {
            let value = self.pop()?;
            return self.push(Variable::Boolean(!value.is_truthy()));
        }

        let (a, b) = self.pop_pair()?;
        let result = match op {
            OpCode::Add => numeric(a, b, |x, y| Some(x.wrapping_add(y)), |x, y| x + y),
            OpCode::Subtract => numeric(a, b, |x, y| Some(x.wrapping_sub(y)), |x, y| x - y),
            OpCode::Multiply => numeric(a, b, |x, y| Some(x.wrapping_mul(y)), |x, y| x * y),
            OpCode::Divide => numeric(a, b, i64::checked_div, |x, y| x / y),
            OpCode::Less => compare(a, b, i64::lt, f64::lt),
            OpCode::LessOrEqual => compare(a, b, i64::le, f64::le),
            OpCode::Greater => compare(a, b, i64::gt, f64::gt),
            OpCode::GreaterOrEqual => compare(a, b, i64::ge, f64::ge),
            OpCode::Equal => Variable::Boolean(self.heap.equals(a, b)),
            OpCode::NotEqual => Variable::Boolean(!self.heap.equals(a, b)),
            OpCode::And => Variable::Boolean(a.is_truthy() && b.is_truthy()),
            OpCode::Or => Variable::Boolean(a.is_truthy() || b.is_truthy()),
            _ => return Err(RuntimeError::UnknownOpcode(op)),
        };
        self.push(result)
    }
}
