//! # Marten VM Core
//!
//! Core execution engine for the Marten register VM, built around an
//! explicit execution context and an on-demand stack walker.
//!
//! ## Design Principles
//!
//! - **Explicit context**: the live call stack is owned by [`VmContext`] and
//!   passed by reference, never read from ambient state
//! - **Arena frames**: frames are addressed by depth in a single `Vec`
//! - **Structured introspection**: [`capture_stack`] returns frames, rendering is separate

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod context;
pub mod error;
pub mod format;
pub mod interpreter;
pub mod intrinsics;
pub mod memory;
pub mod object;
pub mod runtime;
pub mod stack_walker;
pub mod value;

pub use context::{CallFrame, Callee, FrameLocation, SourceLocation, VmContext};
pub use error::{ThrownValue, VmError, VmResult};
pub use interpreter::Interpreter;
pub use memory::MemoryManager;
pub use object::JsObject;
pub use runtime::{RuntimeConfig, VmRuntime};
pub use stack_walker::{FormattedFrame, StackSnapshot, capture_stack, capture_stack_from};
pub use value::Value;
