// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The dynamic value model.
//!
//! Scalars are stored inline. Strings, objects and closures live in the
//! [`Heap`](crate::heap::Heap) and are referred to by typed handles, so a
//! `Variable` is always `Copy`. Equality needs the heap (strings compare by
//! contents) and is provided by [`Heap::equals`](crate::heap::Heap::equals).

use std::fmt;

/// Handle to a heap string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrRef(pub(crate) u32);

/// Handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

/// Handle to a heap closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnRef(pub(crate) u32);

impl StrRef {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl ObjRef {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl FnRef {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dynamically-typed Plume value.
#[derive(Debug, Clone, Copy, Default)]
pub enum Variable {
    #[default]
    Undefined,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(StrRef),
    Object(ObjRef),
    Function(FnRef),
}

impl Variable {
    /// Boolean coercion: undefined is false, booleans are themselves, and
    /// every other value is true.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        match self {
            Variable::Undefined => false,
            Variable::Boolean(b) => *b,
            _ => true,
        }
    }

    /// Name of the value's runtime type, as reported by `type(x)`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::Undefined => "undefined",
            Variable::Boolean(_) => "boolean",
            Variable::Integer(_) => "integer",
            Variable::Float(_) => "float",
            Variable::String(_) => "string",
            Variable::Object(_) => "object",
            Variable::Function(_) => "function",
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Variable::Undefined)
    }
}

/// Formats a float so it always shows a fractional part (`1.0`, `inf`, `NaN`).
pub(crate) fn format_float(value: f64) -> String {
    let mut s = value.to_string();
    if value.is_finite() && !s.contains('.') {
        s.push_str(".0");
    }
    s
}

/// Short debug form used in machine-state dumps, which must not touch the heap.
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Undefined => write!(f, "undefined"),
            Variable::Boolean(b) => write!(f, "{}", b),
            Variable::Integer(n) => write!(f, "{}", n),
            Variable::Float(n) => write!(f, "{}", format_float(*n)),
            Variable::String(r) => write!(f, "<string #{}>", r.0),
            Variable::Object(r) => write!(f, "<object #{}>", r.0),
            Variable::Function(r) => write!(f, "<function #{}>", r.0),
        }
    }
}
