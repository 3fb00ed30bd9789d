// plume-vm - Shared helpers for integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;

use plume_vm::{InterpretError, Interpreter, VmOptions};

/// Run a program with empty input, returning its output.
pub fn compile_and_run(src: &str) -> String {
    run_with(src, b"", VmOptions::default()).expect("program failed")
}

/// Run a program, returning its output or the error that stopped it.
pub fn try_run(src: &str) -> Result<String, InterpretError> {
    run_with(src, b"", VmOptions::default())
}

/// Run a program against the given standard input.
pub fn run_with_input(src: &str, input: &str) -> String {
    run_with(src, input.as_bytes(), VmOptions::default()).expect("program failed")
}

/// Run a program against raw standard input bytes.
pub fn run_with_input_bytes(src: &str, input: &[u8]) -> Result<String, InterpretError> {
    run_with(src, input, VmOptions::default())
}

/// Run a program with `env` reading from the given variables.
pub fn run_with_env(src: &str, vars: &[(&str, &str)]) -> String {
    let environment: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let options = VmOptions {
        environment: Some(environment),
        ..VmOptions::default()
    };
    run_with(src, b"", options).expect("program failed")
}

fn run_with(src: &str, input: &[u8], options: VmOptions) -> Result<String, InterpretError> {
    let mut out = Vec::new();
    let mut input = Cursor::new(input.to_vec());
    Interpreter::with_options(&mut out, &mut input, options).run(src)?;
    Ok(String::from_utf8(out).expect("output is not UTF-8"))
}

/// Output lines of a program.
pub fn lines(src: &str) -> Vec<String> {
    compile_and_run(src).lines().map(str::to_string).collect()
}
