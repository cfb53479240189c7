//! Built-in globals
//!
//! - `print(...args)`: writes the arguments, space separated, as one output line
//! - `MartenInternal.getCallStack()`: the caller's stack, one `name: file:line:column` per line

use std::sync::Arc;

use crate::context::VmContext;
use crate::error::VmResult;
use crate::object::JsObject;
use crate::stack_walker::capture_stack;
use crate::value::Value;

/// Global name of the runtime-internal namespace
pub const INTERNAL_NAMESPACE: &str = "MartenInternal";

/// Install the built-in globals into `ctx`
pub fn install(ctx: &mut VmContext) {
    ctx.set_global("print", Value::native("print", print));

    let internal = JsObject::new();
    internal.set("getCallStack", Value::native("getCallStack", get_call_stack));
    ctx.set_global(INTERNAL_NAMESPACE, Value::object(Arc::new(internal)));
}

fn print(ctx: &mut VmContext, args: &[Value]) -> VmResult<Value> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ctx.write_output(&line);
    Ok(Value::undefined())
}

fn get_call_stack(ctx: &mut VmContext, _args: &[Value]) -> VmResult<Value> {
    let snapshot = capture_stack(ctx)?;
    Ok(Value::string(snapshot.render()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryManager;
    use parking_lot::Mutex;

    #[test]
    fn test_print_joins_arguments() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);

        let mut ctx = VmContext::new(Arc::new(MemoryManager::test()));
        ctx.set_output(Arc::new(move |line: &str| sink.lock().push(line.to_string())));
        install(&mut ctx);

        print(&mut ctx, &[Value::string("a"), Value::number(1.0), Value::undefined()]).unwrap();
        assert_eq!(lines.lock().as_slice(), ["a 1 undefined"]);
    }

    #[test]
    fn test_internal_namespace_installed() {
        let mut ctx = VmContext::new(Arc::new(MemoryManager::test()));
        install(&mut ctx);

        let internal = ctx.get_global(INTERNAL_NAMESPACE).unwrap();
        let object = internal.as_object().unwrap();
        assert!(object.has("getCallStack"));
        assert!(matches!(ctx.get_global("print"), Some(Value::Native(_))));
    }

    #[test]
    fn test_get_call_stack_without_frames() {
        let mut ctx = VmContext::new(Arc::new(MemoryManager::test()));
        let value = get_call_stack(&mut ctx, &[]).unwrap();
        assert_eq!(value.as_str(), Some(""));
    }
}
