//! VM execution context
//!
//! The context holds per-execution state: the call stack (an arena of
//! frames addressed by depth), globals, exception handlers and the
//! output sink used by `print`.

use std::fmt;
use std::sync::Arc;

use marten_vm_bytecode::{Function, Module, Register};
use rustc_hash::FxHashMap;

use crate::error::{VmError, VmResult};
use crate::memory::MemoryManager;
use crate::value::Value;

/// Default maximum call stack depth
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1000;

/// Receives each line written by `print`
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

/// What a frame is executing
#[derive(Debug, Clone)]
pub enum Callee {
    /// A bytecode function
    Bytecode {
        /// Function index in the module
        function_index: u32,
        /// The module this function belongs to
        module: Arc<Module>,
    },
    /// A Rust-implemented function
    Native {
        /// Registered name
        name: &'static str,
    },
}

/// A call stack frame
#[derive(Debug)]
pub struct CallFrame {
    /// Function being executed
    pub callee: Callee,
    /// Program counter (instruction index)
    ///
    /// While a callee runs, the caller's pc stays on its `Call` instruction.
    pub pc: usize,
    /// Register file
    pub registers: Vec<Value>,
    /// Return register in the caller (where to put the result)
    pub return_register: Option<Register>,
}

impl CallFrame {
    /// Bytecode function of this frame, if any
    pub fn function(&self) -> Option<&Function> {
        match &self.callee {
            Callee::Bytecode {
                function_index,
                module,
            } => module.function(*function_index),
            Callee::Native { .. } => None,
        }
    }

    /// Source URL of the frame's module
    pub fn source_url(&self) -> Option<&str> {
        match &self.callee {
            Callee::Bytecode { module, .. } => Some(&module.source_url),
            Callee::Native { .. } => None,
        }
    }

    /// Check if this is a native frame
    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self.callee, Callee::Native { .. })
    }

    /// Function name, or the anonymous placeholder
    pub fn display_name(&self) -> &str {
        match &self.callee {
            Callee::Native { name } => name,
            Callee::Bytecode { .. } => self
                .function()
                .map(Function::display_name)
                .unwrap_or(marten_vm_bytecode::function::ANONYMOUS_FUNCTION_NAME),
        }
    }

    /// Source location of the instruction at the frame's pc
    pub fn location(&self) -> FrameLocation {
        match &self.callee {
            Callee::Native { .. } => FrameLocation::Native,
            Callee::Bytecode {
                function_index,
                module,
            } => module
                .function(*function_index)
                .and_then(|f| f.position_at(self.pc))
                .map(|entry| {
                    FrameLocation::Source(SourceLocation {
                        file: module.source_url.clone(),
                        line: entry.line,
                        column: entry.column,
                    })
                })
                .unwrap_or(FrameLocation::Unknown),
        }
    }
}

/// Source location for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File path
    pub file: String,
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Where a frame is, as far as the runtime can tell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLocation {
    /// Resolved through the function's source map
    Source(SourceLocation),
    /// Native frame, no source
    Native,
    /// Bytecode without a source map entry for the current pc
    Unknown,
}

impl FrameLocation {
    /// The resolved source location, if any
    pub fn source(&self) -> Option<&SourceLocation> {
        match self {
            Self::Source(loc) => Some(loc),
            _ => None,
        }
    }
}

impl fmt::Display for FrameLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(loc) => write!(f, "{}", loc),
            Self::Native => write!(f, "native"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone)]
struct TryHandler {
    catch_pc: usize,
    frame_depth: usize,
}

/// VM execution context
///
/// Holds execution state for a single thread of execution. Not shared:
/// the stack walker borrows it immutably, so no frame can be pushed or
/// popped while a walk is in progress.
pub struct VmContext {
    /// Call stack, index 0 is the program entry
    call_stack: Vec<CallFrame>,
    /// Global bindings
    globals: FxHashMap<String, Value>,
    /// Exception being delivered to a `Catch`
    exception: Option<Value>,
    /// Try/catch handler stack (catch pc + frame depth)
    try_stack: Vec<TryHandler>,
    /// Maximum call stack depth
    max_stack_depth: usize,
    /// Memory accounting shared with the runtime
    memory_manager: Arc<MemoryManager>,
    /// Destination of `print`
    output: OutputSink,
}

impl VmContext {
    /// Create a new context
    pub fn new(memory_manager: Arc<MemoryManager>) -> Self {
        Self {
            call_stack: Vec::with_capacity(64),
            globals: FxHashMap::default(),
            exception: None,
            try_stack: Vec::new(),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            memory_manager,
            output: Arc::new(|line: &str| println!("{}", line)),
        }
    }

    /// Set the maximum call stack depth
    pub fn set_max_stack_depth(&mut self, depth: usize) {
        self.max_stack_depth = depth;
    }

    /// Replace the output sink
    pub fn set_output(&mut self, output: OutputSink) {
        self.output = output;
    }

    /// Write one line to the output sink
    pub fn write_output(&self, line: &str) {
        (self.output)(line);
    }

    /// Memory manager used for bookings made on behalf of this context
    pub fn memory_manager(&self) -> &Arc<MemoryManager> {
        &self.memory_manager
    }

    /// Get global variable
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Set global variable
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Push a new bytecode frame
    ///
    /// Arguments land in registers `0..args.len()`; extra arguments beyond
    /// the register file are dropped.
    pub fn push_frame(
        &mut self,
        function_index: u32,
        module: Arc<Module>,
        args: Vec<Value>,
        return_register: Option<Register>,
    ) -> VmResult<()> {
        if self.call_stack.len() >= self.max_stack_depth {
            return Err(VmError::StackOverflow);
        }

        let register_count = module
            .function(function_index)
            .ok_or_else(|| VmError::internal(format!("function {} not found", function_index)))?
            .register_count as usize;

        let mut registers = vec![Value::undefined(); register_count];
        for (slot, arg) in registers.iter_mut().zip(args) {
            *slot = arg;
        }

        self.call_stack.push(CallFrame {
            callee: Callee::Bytecode {
                function_index,
                module,
            },
            pc: 0,
            registers,
            return_register,
        });

        Ok(())
    }

    /// Push a frame for a native call
    pub fn push_native_frame(&mut self, name: &'static str) -> VmResult<()> {
        if self.call_stack.len() >= self.max_stack_depth {
            return Err(VmError::StackOverflow);
        }

        self.call_stack.push(CallFrame {
            callee: Callee::Native { name },
            pc: 0,
            registers: Vec::new(),
            return_register: None,
        });

        Ok(())
    }

    /// Pop the current call frame, discarding its try handlers
    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        let frame = self.call_stack.pop()?;
        let depth = self.call_stack.len();
        self.try_stack.retain(|h| h.frame_depth <= depth);
        Some(frame)
    }

    /// Pop frames until the stack is `depth` frames deep
    pub fn unwind_to(&mut self, depth: usize) {
        while self.call_stack.len() > depth {
            self.pop_frame();
        }
    }

    /// Get current call frame
    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    /// Get current call frame mutably
    #[inline]
    pub fn current_frame_mut(&mut self) -> Option<&mut CallFrame> {
        self.call_stack.last_mut()
    }

    /// Get call stack depth
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Get the call stack (for inspection), program entry first
    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    /// Get program counter
    #[inline]
    pub fn pc(&self) -> usize {
        self.current_frame().map(|f| f.pc).unwrap_or(0)
    }

    /// Set program counter
    #[inline]
    pub fn set_pc(&mut self, pc: usize) {
        if let Some(frame) = self.current_frame_mut() {
            frame.pc = pc;
        }
    }

    /// Increment program counter
    #[inline]
    pub fn advance_pc(&mut self) {
        if let Some(frame) = self.current_frame_mut() {
            frame.pc += 1;
        }
    }

    /// Jump relative to current PC
    pub fn jump(&mut self, offset: i32) -> VmResult<()> {
        let frame = self
            .current_frame_mut()
            .ok_or_else(|| VmError::internal("jump without a frame"))?;
        frame.pc = frame
            .pc
            .checked_add_signed(offset as isize)
            .ok_or_else(|| VmError::internal(format!("jump offset {} out of range", offset)))?;
        Ok(())
    }

    /// Read a register of the current frame
    pub fn get_register(&self, reg: Register) -> VmResult<&Value> {
        self.current_frame()
            .and_then(|f| f.registers.get(reg.0 as usize))
            .ok_or_else(|| VmError::internal(format!("register r{} out of bounds", reg.0)))
    }

    /// Write a register of the current frame
    pub fn set_register(&mut self, reg: Register, value: Value) -> VmResult<()> {
        let slot = self
            .current_frame_mut()
            .and_then(|f| f.registers.get_mut(reg.0 as usize))
            .ok_or_else(|| VmError::internal(format!("register r{} out of bounds", reg.0)))?;
        *slot = value;
        Ok(())
    }

    /// Push a try handler for the current frame.
    pub fn push_try(&mut self, catch_pc: usize) {
        self.try_stack.push(TryHandler {
            catch_pc,
            frame_depth: self.call_stack.len(),
        });
    }

    /// Pop the most recent try handler if it belongs to the current frame.
    pub fn pop_try_for_current_frame(&mut self) {
        if let Some(top) = self.try_stack.last()
            && top.frame_depth == self.call_stack.len()
        {
            self.try_stack.pop();
        }
    }

    /// Pop and return the nearest try handler as (frame depth, catch pc).
    pub fn take_nearest_try(&mut self) -> Option<(usize, usize)> {
        let handler = self.try_stack.pop()?;
        Some((handler.frame_depth, handler.catch_pc))
    }

    /// Set the exception delivered to the next `Catch`
    pub fn set_exception(&mut self, value: Value) {
        self.exception = Some(value);
    }

    /// Take the pending exception
    pub fn take_exception(&mut self) -> Option<Value> {
        self.exception.take()
    }
}

impl fmt::Debug for VmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmContext")
            .field("stack_depth", &self.call_stack.len())
            .field("globals", &self.globals.len())
            .field("try_handlers", &self.try_stack.len())
            .finish()
    }
}
