// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! I/O, introspection and string opcode handlers.

use std::io::{BufRead, Write};

use crate::opcode::OpCode;
use crate::value::Variable;
use crate::vm::{Result, RuntimeError, VM};

/// Truncate a float to an integer if the result is representable.
fn float_to_int(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; every finite float below it truncates
    // into range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.is_finite() && value >= -LIMIT && value < LIMIT {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

impl VM<'_> {
    /// Execute an I/O, introspection or string opcode.
    pub(crate) fn execute_builtins(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::Read => {
                let mut line = Vec::new();
                if self.input.read_until(b'\n', &mut line)? == 0 {
                    return self.push(Variable::Undefined);
                }
                if line.ends_with(b"\n") {
                    line.pop();
                    if line.ends_with(b"\r") {
                        line.pop();
                    }
                }
                self.push_string(String::from_utf8_lossy(&line).into_owned())
            }
            OpCode::Print => {
                let value = self.pop()?;
                let text = self.heap.display(value);
                writeln!(self.out, "{}", text)?;
                self.push(Variable::Undefined)
            }
            OpCode::GetEnv => {
                let key = self.pop()?;
                let Variable::String(key) = key else {
                    return self.push(Variable::Undefined);
                };
                let key = self.string(key)?;
                let found = match &self.options.environment {
                    Some(environment) => environment.get(key).cloned(),
                    None => std::env::var(key).ok(),
                };
                match found {
                    Some(value) => self.push_string(value),
                    None => self.push(Variable::Undefined),
                }
            }
            OpCode::GetType => {
                let value = self.pop()?;
                self.push_string(value.type_name().to_string())
            }
            OpCode::CastToInt => {
                let value = self.pop()?;
                let result = match value {
                    Variable::Integer(n) => Some(n),
                    Variable::Float(n) => float_to_int(n),
                    Variable::String(s) => self.string(s)?.parse::<i64>().ok(),
                    _ => None,
                };
                self.push(result.map_or(Variable::Undefined, Variable::Integer))
            }
            OpCode::CastToFloat => {
                let value = self.pop()?;
                let result = match value {
                    Variable::Integer(n) => Some(n as f64),
                    Variable::Float(n) => Some(n),
                    Variable::String(s) => self.string(s)?.parse::<f64>().ok(),
                    _ => None,
                };
                self.push(result.map_or(Variable::Undefined, Variable::Float))
            }
            OpCode::Length => {
                let value = self.pop()?;
                let length = match value {
                    Variable::String(s) => Some(self.string(s)?.chars().count()),
                    Variable::Object(o) => Some(
                        self.heap
                            .object(o)
                            .ok_or(RuntimeError::DanglingReference)?
                            .len(),
                    ),
                    _ => None,
                };
                self.push(length.map_or(Variable::Undefined, |n| Variable::Integer(n as i64)))
            }
            OpCode::CharAt => {
                let (string, index) = self.pop_pair()?;
                let found = match (string, index) {
                    (Variable::String(s), Variable::Integer(i)) if i >= 0 => {
                        self.string(s)?.chars().nth(i as usize)
                    }
                    _ => None,
                };
                match found {
                    Some(c) => self.push_string(c.to_string()),
                    None => self.push(Variable::Undefined),
                }
            }
            OpCode::StringAppend => {
                let (a, b) = self.pop_pair()?;
                let mut joined = self.heap.display(a);
                joined.push_str(&self.heap.display(b));
                self.push_string(joined)
            }
            _ => Err(RuntimeError::UnknownOpcode(op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_int() {
        assert_eq!(float_to_int(2.9), Some(2));
        assert_eq!(float_to_int(-2.9), Some(-2));
        assert_eq!(float_to_int(-9_223_372_036_854_775_808.0), Some(i64::MIN));
        assert_eq!(float_to_int(9_223_372_036_854_775_808.0), None);
        assert_eq!(float_to_int(f64::NAN), None);
        assert_eq!(float_to_int(f64::INFINITY), None);
    }
}
