// plume-vm - Bytecode compiler and virtual machine for the Plume scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Binary serialization of compiled programs.
//!
//! Binary format (.plmb), all integers little-endian:
//!   - 4 bytes: magic "PLMB"
//!   - 1 byte: version (currently 1)
//!   - Integer pool: u32 count, then i64 values
//!   - Float pool: u32 count, then IEEE 754 bits as u64
//!   - String pool: u32 count, then (u32 length, UTF-8 bytes)
//!   - Shape table: u32 count, then (u32 key count, keys as pool strings)
//!   - Entry function
//!   - Function table: u32 count, then functions
//!
//! A function is u32 argument count, u32 locals count, u32 capture count,
//! (u32 depth, u32 slot) per capture, u32 instruction count, then
//! (u8 opcode, u32 parameter) per instruction. The locals count must cover
//! the arguments and may not exceed [`MAX_LOCALS`].

use thiserror::Error;

use crate::opcode::{Instruction, OpCode};
use crate::program::{Capture, CompiledProgram, FunctionPrototype, MAX_LOCALS, ObjectShape};

pub const MAGIC: &[u8; 4] = b"PLMB";
pub const VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Not a compiled Plume program (bad magic)")]
    BadMagic,

    #[error("Unsupported bytecode version {0}")]
    UnsupportedVersion(u8),

    #[error("Unexpected end of input at byte {0}")]
    Truncated(usize),

    #[error("Invalid UTF-8 in string at byte {0}")]
    InvalidUtf8(usize),

    #[error("Unknown opcode byte {byte:#04x} at byte {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("Invalid function at byte {offset}: {reason}")]
    InvalidFunction { offset: usize, reason: &'static str },

    #[error("{0} trailing byte(s) after program")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Does `bytes` start with the compiled program magic?
pub fn is_compiled(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

// ============================================================================
// Encoding
// ============================================================================

/// Serialize a compiled program.
pub fn encode(program: &CompiledProgram) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(MAGIC);
    bytes.push(VERSION);

    write_len(&mut bytes, program.integers.len());
    for n in &program.integers {
        bytes.extend_from_slice(&n.to_le_bytes());
    }

    write_len(&mut bytes, program.floats.len());
    for n in &program.floats {
        bytes.extend_from_slice(&n.to_bits().to_le_bytes());
    }

    write_len(&mut bytes, program.strings.len());
    for s in &program.strings {
        write_str(&mut bytes, s);
    }

    write_len(&mut bytes, program.shapes.len());
    for shape in &program.shapes {
        write_len(&mut bytes, shape.keys.len());
        for key in &shape.keys {
            write_str(&mut bytes, key);
        }
    }

    write_function(&mut bytes, &program.entry);
    write_len(&mut bytes, program.functions.len());
    for function in &program.functions {
        write_function(&mut bytes, function);
    }
    bytes
}

fn write_u32(bytes: &mut Vec<u8>, v: u32) {
    bytes.extend_from_slice(&v.to_le_bytes());
}

fn write_len(bytes: &mut Vec<u8>, len: usize) {
    write_u32(bytes, len as u32);
}

fn write_str(bytes: &mut Vec<u8>, s: &str) {
    write_len(bytes, s.len());
    bytes.extend_from_slice(s.as_bytes());
}

fn write_function(bytes: &mut Vec<u8>, function: &FunctionPrototype) {
    write_u32(bytes, function.argument_count);
    write_u32(bytes, function.locals_count);
    write_len(bytes, function.captures.len());
    for capture in &function.captures {
        write_u32(bytes, capture.scope_depth);
        write_u32(bytes, capture.local_index);
    }
    write_len(bytes, function.instructions.len());
    for instruction in function.instructions.iter() {
        bytes.push(instruction.op.to_byte());
        write_u32(bytes, instruction.parameter);
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Deserialize a compiled program, rejecting anything malformed.
pub fn decode(bytes: &[u8]) -> Result<CompiledProgram> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(MAGIC.len()).ok() != Some(MAGIC.as_slice()) {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let count = reader.len()?;
    let mut integers = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        integers.push(reader.u64()? as i64);
    }

    let count = reader.len()?;
    let mut floats = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        floats.push(f64::from_bits(reader.u64()?));
    }

    let count = reader.len()?;
    let mut strings = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        strings.push(reader.string()?);
    }

    let count = reader.len()?;
    let mut shapes = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        let key_count = reader.len()?;
        let mut keys = Vec::with_capacity(key_count.min(reader.remaining() / 4));
        for _ in 0..key_count {
            keys.push(reader.string()?);
        }
        shapes.push(ObjectShape { keys });
    }

    let entry = reader.function()?;
    let count = reader.len()?;
    let mut functions = Vec::with_capacity(count.min(reader.remaining() / 16));
    for _ in 0..count {
        functions.push(reader.function()?);
    }

    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    Ok(CompiledProgram {
        entry,
        functions,
        shapes,
        integers,
        floats,
        strings,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::Truncated(self.bytes.len()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.len()?;
        let start = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|e| DecodeError::InvalidUtf8(start + e.valid_up_to()))
    }

    fn function(&mut self) -> Result<FunctionPrototype> {
        let offset = self.pos;
        let argument_count = self.u32()?;
        let locals_count = self.u32()?;
        if locals_count > MAX_LOCALS {
            return Err(DecodeError::InvalidFunction {
                offset,
                reason: "too many locals",
            });
        }
        if locals_count < argument_count {
            return Err(DecodeError::InvalidFunction {
                offset,
                reason: "fewer locals than arguments",
            });
        }

        let count = self.len()?;
        let mut captures = Vec::with_capacity(count.min(self.remaining() / 8));
        for _ in 0..count {
            let scope_depth = self.u32()?;
            let local_index = self.u32()?;
            captures.push(Capture::new(scope_depth, local_index));
        }

        let count = self.len()?;
        let mut instructions = Vec::with_capacity(count.min(self.remaining() / 5));
        for _ in 0..count {
            let offset = self.pos;
            let byte = self.u8()?;
            let op = OpCode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { byte, offset })?;
            instructions.push(Instruction::new(op, self.u32()?));
        }

        Ok(FunctionPrototype::new(
            argument_count,
            locals_count,
            captures,
            instructions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompiledProgram {
        CompiledProgram {
            entry: FunctionPrototype::new(
                0,
                1,
                vec![],
                vec![
                    Instruction::new(OpCode::LoadStringConstant, 0),
                    Instruction::new(OpCode::MakeFn, 0),
                    Instruction::new(OpCode::Invoke, 0),
                    Instruction::bare(OpCode::Halt),
                ],
            ),
            functions: vec![FunctionPrototype::new(
                1,
                2,
                vec![Capture::new(1, 0)],
                vec![
                    Instruction::new(OpCode::LoadClosure, 0),
                    Instruction::bare(OpCode::Return),
                ],
            )],
            shapes: vec![ObjectShape {
                keys: vec!["x".into(), "ü".into()],
            }],
            integers: vec![0, -1, i64::MAX],
            floats: vec![0.5, f64::INFINITY],
            strings: vec!["héllo".into(), String::new()],
        }
    }

    #[test]
    fn test_encode_header() {
        let bytes = encode(&sample());
        assert!(is_compiled(&bytes));
        assert_eq!(bytes[4], VERSION);
        assert_eq!(&bytes[5..9], &3u32.to_le_bytes());
    }

    #[test]
    fn test_decode_restores_program() {
        let program = sample();
        assert_eq!(decode(&encode(&program)).unwrap(), program);
    }

    #[test]
    fn test_bad_magic() {
        assert_eq!(decode(b"PLUM\x01"), Err(DecodeError::BadMagic));
        assert_eq!(decode(b"PL"), Err(DecodeError::BadMagic));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(&sample());
        bytes[4] = 9;
        assert_eq!(decode(&bytes), Err(DecodeError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode(&sample());
        for cut in [5, 12, bytes.len() - 1] {
            assert!(matches!(
                decode(&bytes[..cut]),
                Err(DecodeError::Truncated(_))
            ));
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&sample());
        bytes.push(0);
        assert_eq!(decode(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_unknown_opcode() {
        let program = CompiledProgram {
            entry: FunctionPrototype::new(0, 0, vec![], vec![Instruction::bare(OpCode::Halt)]),
            functions: vec![],
            shapes: vec![],
            integers: vec![],
            floats: vec![],
            strings: vec![],
        };
        let mut bytes = encode(&program);
        let offset = bytes.len() - 4 - 5;
        bytes[offset] = 0xff;
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::UnknownOpcode { byte: 0xff, offset })
        );
    }

    fn with_entry(entry: FunctionPrototype) -> Vec<u8> {
        encode(&CompiledProgram {
            entry,
            functions: vec![],
            shapes: vec![],
            integers: vec![],
            floats: vec![],
            strings: vec![],
        })
    }

    #[test]
    fn test_oversized_frame_rejected() {
        // magic, version, four empty pools
        let offset = 4 + 1 + 4 * 4;
        let bytes = with_entry(FunctionPrototype::new(0, u32::MAX, vec![], vec![]));
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::InvalidFunction {
                offset,
                reason: "too many locals"
            })
        );

        let bytes = with_entry(FunctionPrototype::new(0, MAX_LOCALS, vec![], vec![]));
        assert!(decode(&bytes).is_ok());
    }

    #[test]
    fn test_locals_must_cover_arguments() {
        let bytes = with_entry(FunctionPrototype::new(3, 2, vec![], vec![]));
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::InvalidFunction {
                reason: "fewer locals than arguments",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let program = CompiledProgram {
            entry: FunctionPrototype::new(0, 0, vec![], vec![]),
            functions: vec![],
            shapes: vec![],
            integers: vec![],
            floats: vec![],
            strings: vec!["ab".into()],
        };
        let mut bytes = encode(&program);
        // magic, version, two empty pools, string count, length
        let start = 4 + 1 + 4 + 4 + 4 + 4;
        bytes[start + 1] = 0xff;
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidUtf8(start + 1)));
    }
}
