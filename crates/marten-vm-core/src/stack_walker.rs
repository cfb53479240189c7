//! Call stack introspection
//!
//! [`capture_stack`] takes a fully materialized snapshot of the frames that
//! are active when it is called, innermost first. Each frame reports the
//! position it is currently executing, which for every frame but the
//! innermost is the call that entered the frame below it.
//!
//! The snapshot is booked against the context's [`MemoryManager`] before it
//! is built. A failed booking is reported as `VmError::OutOfMemory`; a
//! snapshot is never truncated.
//!
//! [`MemoryManager`]: crate::memory::MemoryManager

use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use crate::context::{CallFrame, FrameLocation, VmContext};
use crate::error::{VmError, VmResult};
use crate::memory::Allocation;

/// One rendered stack frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedFrame {
    /// Function name or placeholder
    pub name: String,
    /// Where the frame is executing
    pub location: FrameLocation,
}

impl FormattedFrame {
    fn from_frame(frame: &CallFrame) -> Self {
        Self {
            name: frame.display_name().to_string(),
            location: frame.location(),
        }
    }

    /// Line number, if the location resolved
    pub fn line(&self) -> Option<u32> {
        self.location.source().map(|loc| loc.line)
    }

    /// Column number, if the location resolved
    pub fn column(&self) -> Option<u32> {
        self.location.source().map(|loc| loc.column)
    }
}

impl fmt::Display for FormattedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.location)
    }
}

/// A captured call stack, innermost frame first
#[derive(Debug)]
pub struct StackSnapshot {
    frames: Vec<FormattedFrame>,
    _booking: Allocation,
}

impl StackSnapshot {
    /// Captured frames, innermost first
    pub fn frames(&self) -> &[FormattedFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if no frame was captured
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Render one `name: file:line:column` line per frame
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Release the booking and keep the frames
    pub fn into_frames(self) -> Vec<FormattedFrame> {
        self.frames
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", frame)?;
        }
        Ok(())
    }
}

/// Capture the active call stack on behalf of an introspection call.
///
/// When the innermost frame is native it belongs to the introspection call
/// itself and is left out, so the snapshot starts at its caller.
pub fn capture_stack(ctx: &VmContext) -> VmResult<StackSnapshot> {
    let skip = match ctx.current_frame() {
        Some(frame) if frame.is_native() => 1,
        _ => 0,
    };
    capture_stack_from(ctx, skip)
}

/// Capture the active call stack, leaving out the `skip` innermost frames.
pub fn capture_stack_from(ctx: &VmContext, skip: usize) -> VmResult<StackSnapshot> {
    let active = ctx.call_stack();
    let count = active.len().saturating_sub(skip);
    let visible = &active[..count];

    let booking = Allocation::new(snapshot_size(visible), Arc::clone(ctx.memory_manager()))?;

    let mut frames = Vec::new();
    frames
        .try_reserve_exact(count)
        .map_err(|_| VmError::OutOfMemory)?;
    frames.extend(visible.iter().rev().map(FormattedFrame::from_frame));

    tracing::trace!(frames = frames.len(), skipped = skip, "captured call stack");

    Ok(StackSnapshot {
        frames,
        _booking: booking,
    })
}

/// Bytes the snapshot of `frames` will own
fn snapshot_size(frames: &[CallFrame]) -> usize {
    frames.iter().fold(0usize, |total, frame| {
        total
            .saturating_add(size_of::<FormattedFrame>())
            .saturating_add(frame.display_name().len())
            .saturating_add(frame.source_url().map_or(0, str::len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SourceLocation;
    use crate::memory::MemoryManager;
    use marten_vm_bytecode::{Function, Instruction, Module, Register};

    fn call(line: u32, column: u32) -> (Instruction, u32, u32) {
        (
            Instruction::Call {
                dst: Register(0),
                func: Register(0),
                argc: 0,
            },
            line,
            column,
        )
    }

    fn mapped(name: Option<&str>, at: (Instruction, u32, u32)) -> Function {
        let builder = Function::builder().register_count(1);
        let builder = match name {
            Some(name) => builder.name(name),
            None => builder,
        };
        builder.instruction_at(at.0, at.1, at.2).build()
    }

    fn nested_context(limit: usize) -> VmContext {
        let mut builder = Module::builder("/tmp/walk.js");
        builder.add_function(mapped(Some("global"), call(20, 7)));
        builder.add_function(mapped(Some("outer"), call(3, 11)));
        builder.add_function(mapped(None, call(9, 13)));
        let module = Arc::new(builder.build());

        let mut ctx = VmContext::new(Arc::new(MemoryManager::new(limit)));
        for index in 0..3 {
            ctx.push_frame(index, Arc::clone(&module), vec![], None).unwrap();
        }
        ctx
    }

    #[test]
    fn test_frames_innermost_first() {
        let ctx = nested_context(usize::MAX);
        let snapshot = capture_stack(&ctx).unwrap();

        let names: Vec<&str> = snapshot.frames().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["(anonymous)", "outer", "global"]);
        assert_eq!(snapshot.frames()[0].line(), Some(9));
        assert_eq!(snapshot.frames()[0].column(), Some(13));
        assert_eq!(
            snapshot.frames()[2].location,
            FrameLocation::Source(SourceLocation {
                file: "/tmp/walk.js".to_string(),
                line: 20,
                column: 7,
            })
        );
    }

    #[test]
    fn test_native_introspection_frame_is_skipped() {
        let mut ctx = nested_context(usize::MAX);
        ctx.push_native_frame("getCallStack").unwrap();

        let snapshot = capture_stack(&ctx).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.frames()[0].name, "(anonymous)");
    }

    #[test]
    fn test_explicit_skip() {
        let ctx = nested_context(usize::MAX);
        let snapshot = capture_stack_from(&ctx, 2).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.frames()[0].name, "global");

        let empty = capture_stack_from(&ctx, 10).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_render() {
        let ctx = nested_context(usize::MAX);
        let rendered = capture_stack(&ctx).unwrap().render();
        assert_eq!(
            rendered,
            "(anonymous): /tmp/walk.js:9:13\nouter: /tmp/walk.js:3:11\nglobal: /tmp/walk.js:20:7"
        );
    }

    #[test]
    fn test_repeated_captures_are_identical() {
        let ctx = nested_context(usize::MAX);
        let first = capture_stack(&ctx).unwrap();
        let second = capture_stack(&ctx).unwrap();
        assert_eq!(first.frames(), second.frames());
    }

    #[test]
    fn test_out_of_memory_is_reported_not_truncated() {
        let ctx = nested_context(16);
        let result = capture_stack(&ctx);
        assert!(matches!(result, Err(VmError::OutOfMemory)));
        assert_eq!(ctx.memory_manager().allocated(), 0);
    }

    #[test]
    fn test_booking_released_with_snapshot() {
        let ctx = nested_context(usize::MAX);
        let snapshot = capture_stack(&ctx).unwrap();
        assert!(ctx.memory_manager().allocated() > 0);

        let frames = snapshot.into_frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(ctx.memory_manager().allocated(), 0);
    }
}
