//! Bytecode errors

use thiserror::Error;

/// Errors that can occur during bytecode operations
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Invalid magic bytes in bytecode file
    #[error("Invalid magic bytes")]
    InvalidMagic,

    /// Unsupported bytecode version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Unexpected end of bytecode
    #[error("Unexpected end of bytecode")]
    UnexpectedEnd,

    /// Entry point does not name a function of the module
    #[error("Entry point {0} out of range")]
    InvalidEntryPoint(u32),

    /// Source map entries are not strictly increasing by instruction index
    #[error("Source map of function {function} is not sorted by instruction index")]
    UnsortedSourceMap {
        /// Index of the offending function
        function: u32,
    },

    /// Module body could not be encoded or decoded
    #[error("Malformed module body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// IO error during serialization
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
