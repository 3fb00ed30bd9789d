// plume-vm - Error path tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests for error paths:
//! - Front-end rejections (parse and semantic errors)
//! - Soft failures that leave the machine running
//! - Fatal traps and the machine-state dump

mod common;

use common::try_run;
use plume_vm::{
    CompiledProgram, FunctionPrototype, Instruction, InterpretError, Interpreter, OpCode,
    RuntimeError, Status, VM, Variable, compile_source,
};

fn expect_semantic_error(src: &str, expected_pattern: &str) {
    match try_run(src) {
        Err(InterpretError::Semantic(errors)) => {
            let text = errors.to_string();
            assert!(
                text.contains(expected_pattern),
                "Error '{}' should contain '{}' for source: {}",
                text,
                expected_pattern,
                src
            );
        }
        other => panic!("Expected a semantic error for {}, got {:?}", src, other),
    }
}

#[test]
fn test_parse_errors() {
    for src in ["var = 1;", "print(1)", "if true { }", "{ var x = 1;", "\"open"] {
        assert!(
            matches!(try_run(src), Err(InterpretError::Parse(_))),
            "expected a parse error for {}",
            src
        );
    }
}

#[test]
fn test_semantic_errors() {
    expect_semantic_error("print(x);", "'x' is not declared");
    expect_semantic_error("var x = 1; var x = 2;", "already declared");
    expect_semantic_error("break;", "'break' outside of a loop");
    expect_semantic_error("return 1;", "'return' outside of a function");
    expect_semantic_error("print(add(1));", "takes 2 argument(s), got 1");
    expect_semantic_error(
        "while (true) { var f = function() { break; }; }",
        "'break' outside of a loop",
    );
    expect_semantic_error(
        "var x = 1; var f = function() { x = 2; };",
        "enclosing function",
    );
}

#[test]
fn test_semantic_errors_are_all_reported() {
    match try_run("print(a); print(b); break;") {
        Err(InterpretError::Semantic(errors)) => assert_eq!(errors.len(), 3),
        other => panic!("Expected semantic errors, got {:?}", other),
    }
}

#[test]
fn test_frontend_errors_produce_no_output() {
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let result = Interpreter::new(&mut out, &mut input).run("print(1); print(y);");
    assert!(result.unwrap_err().is_frontend());
    assert!(out.is_empty());
}

#[test]
fn test_type_mismatch_leaves_one_operand() {
    let program = compile_source(r#"add(1, "a");"#).unwrap();
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let mut vm = VM::new(&program, &mut out, &mut input);
    for _ in 0..3 {
        assert_eq!(vm.step().unwrap(), Status::Running);
    }
    assert!(matches!(vm.operands(), [Variable::Undefined]));
    assert!(!vm.has_panicked());
}

fn program(entry: Vec<Instruction>) -> CompiledProgram {
    CompiledProgram {
        entry: FunctionPrototype::new(0, 1, vec![], entry),
        functions: vec![],
        shapes: vec![],
        integers: vec![7],
        floats: vec![],
        strings: vec![],
    }
}

#[test]
fn test_return_without_caller_is_fatal() {
    let program = program(vec![
        Instruction::new(OpCode::LoadIntegerConstant, 0),
        Instruction::bare(OpCode::Return),
        Instruction::bare(OpCode::Halt),
    ]);
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let result = Interpreter::new(&mut out, &mut input).run_program(&program);
    assert!(matches!(
        result,
        Err(InterpretError::Runtime(RuntimeError::MissingCallerFrame))
    ));

    let dump = String::from_utf8(out).unwrap();
    assert!(dump.starts_with("PANIC: Return with no caller frame"));
    assert!(dump.contains("== machine state =="));
    assert!(dump.contains("-- frame 0 (<entry>) pc 2 --"));
    assert!(dump.contains("operands: [7]"));
    assert!(dump.contains("== program =="));
    assert!(dump.contains("LoadIntegerConstant"));
    assert!(dump.contains("; 7"));
}

#[test]
fn test_stack_underflow_is_fatal() {
    let program = program(vec![Instruction::bare(OpCode::Add)]);
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let mut vm = VM::new(&program, &mut out, &mut input);
    assert!(matches!(vm.run(), Err(RuntimeError::StackUnderflow)));
    assert!(vm.has_panicked());
    assert!(vm.heap().is_released());
}

#[test]
fn test_running_past_the_end_is_fatal() {
    let program = program(vec![Instruction::new(OpCode::LoadIntegerConstant, 0)]);
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let result = VM::new(&program, &mut out, &mut input).run();
    assert!(matches!(
        result,
        Err(RuntimeError::ProgramCounterOutOfBounds { pc: 1, len: 1, .. })
    ));
}

#[test]
fn test_missing_function_is_fatal() {
    let program = program(vec![Instruction::new(OpCode::MakeFn, 3)]);
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let result = VM::new(&program, &mut out, &mut input).run();
    assert!(matches!(result, Err(RuntimeError::MissingFunction(_))));
}

#[test]
fn test_local_out_of_bounds_is_fatal() {
    let program = program(vec![Instruction::new(OpCode::LoadLocal, 4)]);
    let mut out = Vec::new();
    let mut input = std::io::empty();
    let result = VM::new(&program, &mut out, &mut input).run();
    assert!(matches!(
        result,
        Err(RuntimeError::LocalOutOfBounds { slot: 4, len: 1 })
    ));
}
