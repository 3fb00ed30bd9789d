// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Machine-state dumps for fatal errors and single-step mode.

use std::fmt::Write as _;
use std::io::Write;

use tracing::error;

use crate::value::Variable;

use super::{RuntimeError, VM};

fn list(values: &[Variable]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

impl VM<'_> {
    /// Every active frame, innermost first: program counter, locals, operand
    /// stack and the frame's listing.
    pub fn machine_state(&self) -> String {
        let mut out = String::from("== machine state ==\n");
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let _ = writeln!(
                out,
                "-- frame {} ({}) pc {} --",
                depth, frame.function, frame.pc
            );
            let _ = writeln!(out, "locals:   {}", list(&frame.scope.snapshot()));
            let _ = writeln!(out, "operands: {}", list(frame.operands.as_slice()));
            out.push_str(&self.program.disassemble(frame.function));
        }
        out
    }

    /// Report a fatal error: dump the machine state and the whole program to
    /// the output sink, then release the heap. Only the first report of a
    /// run writes anything; a write failure cuts the dump short.
    pub(crate) fn report_fatal(&mut self, err: &RuntimeError) {
        if self.panicking {
            return;
        }
        self.panicking = true;
        error!(error = %err, frames = self.frames.len(), "fatal VM error");

        let mut dump = format!("PANIC: {}\n", err);
        dump.push_str(&self.machine_state());
        dump.push_str("== program ==\n");
        dump.push_str(&self.program.disassemble_all());
        let written = self
            .out
            .write_all(dump.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            error!(error = %e, "could not write fatal dump");
        }

        self.heap.release();
    }

    /// Whether a fatal error has been reported for this run.
    pub fn has_panicked(&self) -> bool {
        self.panicking
    }
}
