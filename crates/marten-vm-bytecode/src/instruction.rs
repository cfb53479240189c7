//! Bytecode instructions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operand::{ConstantIndex, FunctionIndex, JumpOffset, Register};

/// A decoded instruction with its operands
///
/// Calls pass arguments in the registers following the callee register:
/// `func + 1 .. func + argc`. The callee receives them in its own
/// registers `0 .. argc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// dst = undefined
    LoadUndefined {
        /// Destination register
        dst: Register,
    },
    /// dst = value
    LoadInt32 {
        /// Destination register
        dst: Register,
        /// Immediate value
        value: i32,
    },
    /// dst = constants\[idx\]
    LoadConst {
        /// Destination register
        dst: Register,
        /// Constant pool index
        idx: ConstantIndex,
    },
    /// dst = src
    Move {
        /// Destination register
        dst: Register,
        /// Source register
        src: Register,
    },
    /// dst = lhs + rhs (numeric addition or string concatenation)
    Add {
        /// Destination register
        dst: Register,
        /// Left operand
        lhs: Register,
        /// Right operand
        rhs: Register,
    },
    /// dst = globals\[name\]
    GetGlobal {
        /// Destination register
        dst: Register,
        /// Constant pool index of the global name
        name: ConstantIndex,
    },
    /// globals\[name\] = src
    SetGlobal {
        /// Constant pool index of the global name
        name: ConstantIndex,
        /// Source register
        src: Register,
    },
    /// dst = obj.name
    GetPropConst {
        /// Destination register
        dst: Register,
        /// Object register
        obj: Register,
        /// Constant pool index of the property name
        name: ConstantIndex,
    },
    /// dst = closure over functions\[func\]
    Closure {
        /// Destination register
        dst: Register,
        /// Function table index
        func: FunctionIndex,
    },
    /// dst = func(func + 1, .., func + argc)
    Call {
        /// Register receiving the return value
        dst: Register,
        /// Register holding the callee
        func: Register,
        /// Argument count
        argc: u8,
    },
    /// Return src to the caller
    Return {
        /// Returned register
        src: Register,
    },
    /// Return undefined to the caller
    ReturnUndefined,
    /// Unconditional relative jump
    Jump {
        /// Offset from this instruction
        offset: JumpOffset,
    },
    /// Throw the value in src
    Throw {
        /// Thrown register
        src: Register,
    },
    /// Install an exception handler; the handler starts at this instruction + offset
    TryStart {
        /// Offset of the handler's `Catch` instruction
        catch_offset: JumpOffset,
    },
    /// Remove the innermost handler of the current frame
    TryEnd,
    /// dst = the exception being handled
    Catch {
        /// Destination register
        dst: Register,
    },
}

impl Instruction {
    /// Mnemonic used by the disassembler
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadUndefined { .. } => "LoadUndefined",
            Self::LoadInt32 { .. } => "LoadInt32",
            Self::LoadConst { .. } => "LoadConst",
            Self::Move { .. } => "Move",
            Self::Add { .. } => "Add",
            Self::GetGlobal { .. } => "GetGlobal",
            Self::SetGlobal { .. } => "SetGlobal",
            Self::GetPropConst { .. } => "GetPropConst",
            Self::Closure { .. } => "Closure",
            Self::Call { .. } => "Call",
            Self::Return { .. } => "Return",
            Self::ReturnUndefined => "ReturnUndefined",
            Self::Jump { .. } => "Jump",
            Self::Throw { .. } => "Throw",
            Self::TryStart { .. } => "TryStart",
            Self::TryEnd => "TryEnd",
            Self::Catch { .. } => "Catch",
        }
    }

    /// Check if this instruction transfers control into another frame
    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Self::LoadUndefined { dst } | Self::Catch { dst } => write!(f, " r{}", dst.0),
            Self::LoadInt32 { dst, value } => write!(f, " r{}, {}", dst.0, value),
            Self::LoadConst { dst, idx } => write!(f, " r{}, c{}", dst.0, idx.0),
            Self::Move { dst, src } => write!(f, " r{}, r{}", dst.0, src.0),
            Self::Add { dst, lhs, rhs } => write!(f, " r{}, r{}, r{}", dst.0, lhs.0, rhs.0),
            Self::GetGlobal { dst, name } => write!(f, " r{}, c{}", dst.0, name.0),
            Self::SetGlobal { name, src } => write!(f, " c{}, r{}", name.0, src.0),
            Self::GetPropConst { dst, obj, name } => {
                write!(f, " r{}, r{}, c{}", dst.0, obj.0, name.0)
            }
            Self::Closure { dst, func } => write!(f, " r{}, f{}", dst.0, func.0),
            Self::Call { dst, func, argc } => write!(f, " r{}, r{}, {}", dst.0, func.0, argc),
            Self::Return { src } | Self::Throw { src } => write!(f, " r{}", src.0),
            Self::Jump { offset } => write!(f, " {:+}", offset.0),
            Self::TryStart { catch_offset } => write!(f, " {:+}", catch_offset.0),
            Self::ReturnUndefined | Self::TryEnd => Ok(()),
        }
    }
}
