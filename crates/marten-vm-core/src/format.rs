//! Formatting utilities for VM debug output and uncaught exceptions.

use std::fmt::Write;

use crate::context::CallFrame;
use crate::error::ThrownValue;
use crate::stack_walker::FormattedFrame;

/// Format live frames with pc and current instruction, innermost first
pub fn format_call_stack(frames: &[CallFrame]) -> String {
    let mut output = String::new();

    for (i, frame) in frames.iter().rev().enumerate() {
        let _ = write!(output, "  #{:<3} {} @ {}", i, frame.display_name(), frame.location());

        match frame.function().and_then(|f| f.instructions.get(frame.pc)) {
            Some(inst) => {
                let _ = writeln!(output, " [pc {}: {}]", frame.pc, inst);
            }
            None if frame.is_native() => {
                let _ = writeln!(output);
            }
            None => {
                let _ = writeln!(output, " [pc {}]", frame.pc);
            }
        }
    }

    output
}

/// Format captured frames as an indented `at` trace
pub fn format_stack_trace(frames: &[FormattedFrame]) -> String {
    let mut output = String::new();
    for frame in frames {
        let _ = writeln!(output, "    at {}", frame);
    }
    output
}

/// Format an uncaught exception: message line followed by its trace
pub fn format_uncaught(thrown: &ThrownValue) -> String {
    let mut output = format!("Uncaught {}\n", thrown.message);
    output.push_str(&format_stack_trace(&thrown.stack));
    output
}
