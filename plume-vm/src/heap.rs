// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arena for heap-resident values.
//!
//! Strings, objects and closures are appended to per-kind arenas and handed
//! out as small integer handles. Nothing is freed individually; the whole
//! arena is released once, when the run ends.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::value::{FnRef, ObjRef, StrRef, Variable, format_float};
use crate::vm::frame::Scope;
use crate::vm::{Result, RuntimeError};

/// A closure instance: a function table entry plus the values it captured.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Index into the program's function table.
    pub function: usize,

    /// Captured values, in the prototype's capture order.
    pub captures: Vec<Variable>,

    /// The scope the closure was created in. Only used to resolve the
    /// captures of closures created while this one runs.
    pub defining_scope: Rc<Scope>,
}

/// Property storage of a heap object.
pub type Properties = HashMap<String, Variable>;

/// Counts of what a heap held when it was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub strings: usize,
    pub objects: usize,
    pub closures: usize,
}

impl HeapStats {
    pub fn total(&self) -> usize {
        self.strings + self.objects + self.closures
    }
}

/// The run-scoped heap.
#[derive(Debug, Default)]
pub struct Heap {
    strings: Vec<String>,
    objects: Vec<Properties>,
    closures: Vec<Closure>,
    released: bool,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    pub fn alloc_string(&mut self, s: String) -> Result<StrRef> {
        let handle = StrRef(next_handle(self.strings.len(), "string")?);
        self.strings.push(s);
        Ok(handle)
    }

    pub fn alloc_object(&mut self, properties: Properties) -> Result<ObjRef> {
        let handle = ObjRef(next_handle(self.objects.len(), "object")?);
        debug!(object = handle.0, properties = properties.len(), "allocated object");
        self.objects.push(properties);
        Ok(handle)
    }

    pub fn alloc_closure(&mut self, closure: Closure) -> Result<FnRef> {
        let handle = FnRef(next_handle(self.closures.len(), "closure")?);
        debug!(
            closure = handle.0,
            function = closure.function,
            captures = closure.captures.len(),
            "allocated closure"
        );
        self.closures.push(closure);
        Ok(handle)
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn string(&self, handle: StrRef) -> Option<&str> {
        self.strings.get(handle.index()).map(String::as_str)
    }

    pub fn object(&self, handle: ObjRef) -> Option<&Properties> {
        self.objects.get(handle.index())
    }

    pub fn object_mut(&mut self, handle: ObjRef) -> Option<&mut Properties> {
        self.objects.get_mut(handle.index())
    }

    pub fn closure(&self, handle: FnRef) -> Option<&Closure> {
        self.closures.get(handle.index())
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.strings.len() + self.objects.len() + self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // ========================================================================
    // Value semantics that need the heap
    // ========================================================================

    /// Variant-specific equality. Strings compare by contents; objects and
    /// functions compare by identity. Values of different variants are never
    /// equal.
    pub fn equals(&self, a: Variable, b: Variable) -> bool {
        match (a, b) {
            (Variable::Undefined, Variable::Undefined) => true,
            (Variable::Boolean(x), Variable::Boolean(y)) => x == y,
            (Variable::Integer(x), Variable::Integer(y)) => x == y,
            (Variable::Float(x), Variable::Float(y)) => x == y,
            (Variable::String(x), Variable::String(y)) => {
                x == y || (self.string(x).is_some() && self.string(x) == self.string(y))
            }
            (Variable::Object(x), Variable::Object(y)) => x == y,
            (Variable::Function(x), Variable::Function(y)) => x == y,
            _ => false,
        }
    }

    /// The user-visible text of a value, as written by `print`.
    pub fn display(&self, value: Variable) -> String {
        match value {
            Variable::String(handle) => self.string(handle).unwrap_or_default().to_string(),
            Variable::Object(handle) => {
                let Some(properties) = self.object(handle) else {
                    return "{}".to_string();
                };
                let mut keys: Vec<&String> = properties.keys().collect();
                keys.sort();
                let fields: Vec<String> = keys
                    .into_iter()
                    .map(|key| format!("{}: {}", key, self.display_nested(properties[key])))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            other => self.display_scalar(other),
        }
    }

    fn display_nested(&self, value: Variable) -> String {
        match value {
            Variable::String(handle) => format!("{:?}", self.string(handle).unwrap_or_default()),
            Variable::Object(_) => "{...}".to_string(),
            other => self.display_scalar(other),
        }
    }

    fn display_scalar(&self, value: Variable) -> String {
        match value {
            Variable::Undefined => "undefined".to_string(),
            Variable::Boolean(b) => b.to_string(),
            Variable::Integer(n) => n.to_string(),
            Variable::Float(n) => format_float(n),
            Variable::Function(_) => "<function>".to_string(),
            Variable::String(_) | Variable::Object(_) => self.display(value),
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Free every allocation at once. Only the first call does anything.
    pub fn release(&mut self) -> HeapStats {
        if self.released {
            return HeapStats::default();
        }
        let stats = HeapStats {
            strings: self.strings.len(),
            objects: self.objects.len(),
            closures: self.closures.len(),
        };
        self.strings = Vec::new();
        self.objects = Vec::new();
        self.closures = Vec::new();
        self.released = true;
        info!(
            strings = stats.strings,
            objects = stats.objects,
            closures = stats.closures,
            "heap released"
        );
        stats
    }
}

/// Handle for the next allocation in an arena already holding `len` values.
fn next_handle(len: usize, kind: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| RuntimeError::HeapExhausted(kind))
}
