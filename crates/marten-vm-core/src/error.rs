//! VM error types

use crate::stack_walker::FormattedFrame;
use crate::value::Value;
use thiserror::Error;

/// VM execution errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g., calling non-function)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reference error (undefined variable)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Internal error (malformed bytecode, broken frame invariants)
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Stack overflow
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// Out of memory
    #[error("RangeError: Out of memory")]
    OutOfMemory,

    /// Uncaught script exception
    #[error("Uncaught {0}")]
    Exception(Box<ThrownValue>),

    /// Bytecode error
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] marten_vm_bytecode::BytecodeError),
}

/// A thrown script value
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// The thrown value (as a string representation)
    pub message: String,
    /// Stack captured at the throw site, innermost first
    pub stack: Vec<FormattedFrame>,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a reference error
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create an exception from a thrown value and the stack at the throw site
    pub fn exception(value: Value, stack: Vec<FormattedFrame>) -> Self {
        Self::Exception(Box::new(ThrownValue {
            message: value.to_string(),
            value,
            stack,
        }))
    }

    /// Whether a script `try` block may observe this error.
    ///
    /// Internal and bytecode errors always reach the host.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Self::InternalError(_) | Self::Bytecode(_))
    }

    /// The value a `Catch` instruction receives for this error
    pub fn into_thrown_value(self) -> Value {
        match self {
            Self::Exception(thrown) => thrown.value,
            other => Value::string(other.to_string()),
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;
