//! # Marten VM Bytecode
//!
//! This crate defines the bytecode format executed by the Marten VM.
//!
//! ## Design Principles
//!
//! - **Register-based**: Operations work on virtual registers, not a stack
//! - **Source-mapped**: Every function can carry instruction -> line/column positions
//! - **Serializable**: Modules can be written to disk and loaded back

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constant;
pub mod error;
pub mod function;
pub mod instruction;
pub mod module;
pub mod operand;

pub use constant::{Constant, ConstantPool};
pub use error::BytecodeError;
pub use function::{Function, FunctionBuilder, SourceMap, SourceMapEntry};
pub use instruction::Instruction;
pub use module::{Module, ModuleBuilder};
pub use operand::{ConstantIndex, FunctionIndex, JumpOffset, Register};

/// Bytecode format version
pub const BYTECODE_VERSION: u32 = 1;

/// Magic bytes for bytecode files
pub const BYTECODE_MAGIC: [u8; 8] = *b"MARTNBC\0";
