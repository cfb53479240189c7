//! Bytecode interpreter
//!
//! Executes bytecode instructions against a [`VmContext`].

use std::sync::Arc;

use marten_vm_bytecode::{Constant, Instruction, Module, Register};
use tracing::{debug, trace};

use crate::context::{Callee, VmContext};
use crate::error::{VmError, VmResult};
use crate::format::format_call_stack;
use crate::stack_walker::capture_stack_from;
use crate::value::{Closure, NativeFunction, Value};

/// The bytecode interpreter
#[derive(Debug, Default)]
pub struct Interpreter {
    /// Instructions executed since creation
    executed: u64,
}

/// Result of executing one instruction
enum InstructionResult {
    /// Continue with the next instruction
    Continue,
    /// Jump relative to the current instruction
    Jump(i32),
    /// Return from the current frame
    Return(Value),
    /// Enter a bytecode function
    Call {
        closure: Closure,
        args: Vec<Value>,
        return_reg: Register,
    },
}

impl Interpreter {
    /// Create a new interpreter
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions executed so far
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Execute a module's entry function
    ///
    /// On error every frame pushed by this call is unwound before returning.
    pub fn execute(&mut self, module: Arc<Module>, ctx: &mut VmContext) -> VmResult<Value> {
        let entry_point = module.entry_point;
        if module.entry_function().is_none() {
            return Err(VmError::internal("no entry function"));
        }

        let base_depth = ctx.stack_depth();
        ctx.push_frame(entry_point, module, Vec::new(), None)?;

        let result = self.run_loop(ctx, base_depth);
        if let Err(err) = &result {
            debug!(error = %err, "execution failed\n{}", format_call_stack(ctx.call_stack()));
        }

        ctx.unwind_to(base_depth);
        result
    }

    /// Main execution loop
    fn run_loop(&mut self, ctx: &mut VmContext, base_depth: usize) -> VmResult<Value> {
        loop {
            match self.step(ctx, base_depth) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => self.handle_error(ctx, err, base_depth)?,
            }
        }
    }

    /// Execute one instruction of the current frame.
    ///
    /// Returns the completion value once the entry frame returns.
    fn step(&mut self, ctx: &mut VmContext, base_depth: usize) -> VmResult<Option<Value>> {
        let (module, function_index, pc) = {
            let frame = ctx
                .current_frame()
                .ok_or_else(|| VmError::internal("no frame"))?;
            match &frame.callee {
                Callee::Bytecode {
                    function_index,
                    module,
                } => (Arc::clone(module), *function_index, frame.pc),
                Callee::Native { name } => {
                    return Err(VmError::internal(format!(
                        "native frame {} left on the stack",
                        name
                    )));
                }
            }
        };

        let func = module
            .function(function_index)
            .ok_or_else(|| VmError::internal("function not found"))?;

        // Falling off the end returns undefined
        let Some(instruction) = func.instructions.get(pc) else {
            return self.return_from_frame(ctx, Value::undefined(), base_depth);
        };

        self.executed += 1;
        match self.execute_instruction(instruction, &module, ctx)? {
            InstructionResult::Continue => ctx.advance_pc(),
            InstructionResult::Jump(offset) => ctx.jump(offset)?,
            InstructionResult::Return(value) => {
                return self.return_from_frame(ctx, value, base_depth);
            }
            InstructionResult::Call {
                closure,
                args,
                return_reg,
            } => {
                trace!(
                    depth = ctx.stack_depth(),
                    callee = closure.display_name(),
                    "call"
                );
                // The caller's pc stays on the call until the callee returns
                ctx.push_frame(closure.function_index, closure.module, args, Some(return_reg))?;
            }
        }

        Ok(None)
    }

    fn return_from_frame(
        &mut self,
        ctx: &mut VmContext,
        value: Value,
        base_depth: usize,
    ) -> VmResult<Option<Value>> {
        let frame = ctx
            .pop_frame()
            .ok_or_else(|| VmError::internal("return without a frame"))?;

        if ctx.stack_depth() == base_depth {
            return Ok(Some(value));
        }

        if let Some(reg) = frame.return_register {
            ctx.set_register(reg, value)?;
        }
        ctx.advance_pc();
        Ok(None)
    }

    /// Route an error to the nearest script handler, or give it back.
    fn handle_error(
        &mut self,
        ctx: &mut VmContext,
        err: VmError,
        base_depth: usize,
    ) -> VmResult<()> {
        if !err.is_catchable() {
            return Err(err);
        }

        let Some((frame_depth, catch_pc)) = ctx.take_nearest_try() else {
            return Err(err);
        };
        if frame_depth <= base_depth {
            return Err(err);
        }

        trace!(frame_depth, catch_pc, error = %err, "exception caught");
        ctx.unwind_to(frame_depth);
        ctx.set_pc(catch_pc);
        ctx.set_exception(err.into_thrown_value());
        Ok(())
    }

    /// Execute a single instruction
    fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        module: &Arc<Module>,
        ctx: &mut VmContext,
    ) -> VmResult<InstructionResult> {
        match instruction {
            Instruction::LoadUndefined { dst } => {
                ctx.set_register(*dst, Value::undefined())?;
                Ok(InstructionResult::Continue)
            }

            Instruction::LoadInt32 { dst, value } => {
                ctx.set_register(*dst, Value::number(*value as f64))?;
                Ok(InstructionResult::Continue)
            }

            Instruction::LoadConst { dst, idx } => {
                let value = match module.constants.get(idx.0) {
                    Some(Constant::Number(n)) => Value::number(*n),
                    Some(Constant::String(s)) => Value::string(&**s),
                    None => return Err(VmError::internal(format!("constant {} not found", idx.0))),
                };
                ctx.set_register(*dst, value)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::Move { dst, src } => {
                let value = ctx.get_register(*src)?.clone();
                ctx.set_register(*dst, value)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::Add { dst, lhs, rhs } => {
                let left = ctx.get_register(*lhs)?;
                let right = ctx.get_register(*rhs)?;
                let result = match (left, right) {
                    (Value::Number(a), Value::Number(b)) => Value::number(a + b),
                    (Value::String(_), _) | (_, Value::String(_)) => {
                        Value::string(format!("{}{}", left, right))
                    }
                    _ => Value::number(f64::NAN),
                };
                ctx.set_register(*dst, result)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::GetGlobal { dst, name } => {
                let name = constant_name(module, name.0)?;
                let value = ctx
                    .get_global(name)
                    .ok_or_else(|| VmError::reference_error(format!("{} is not defined", name)))?;
                ctx.set_register(*dst, value)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::SetGlobal { name, src } => {
                let name = constant_name(module, name.0)?;
                let value = ctx.get_register(*src)?.clone();
                ctx.set_global(name, value);
                Ok(InstructionResult::Continue)
            }

            Instruction::GetPropConst { dst, obj, name } => {
                let name = constant_name(module, name.0)?;
                let object = ctx.get_register(*obj)?;
                let value = match object.as_object() {
                    Some(o) => o.get(name).unwrap_or_default(),
                    None => {
                        return Err(VmError::type_error(format!(
                            "Cannot read property '{}' of {}",
                            name,
                            object.type_name()
                        )));
                    }
                };
                ctx.set_register(*dst, value)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::Closure { dst, func } => {
                if module.function(func.0).is_none() {
                    return Err(VmError::internal(format!("function {} not found", func.0)));
                }
                let closure = Value::Function(Closure {
                    function_index: func.0,
                    module: Arc::clone(module),
                });
                ctx.set_register(*dst, closure)?;
                Ok(InstructionResult::Continue)
            }

            Instruction::Call { dst, func, argc } => {
                let callee = ctx.get_register(*func)?.clone();

                let mut args = Vec::with_capacity(*argc as usize);
                for i in 1..=*argc {
                    let reg = func
                        .0
                        .checked_add(i)
                        .ok_or_else(|| VmError::internal("argument register out of range"))?;
                    args.push(ctx.get_register(Register(reg))?.clone());
                }

                match callee {
                    Value::Native(native) => {
                        let result = self.call_native(ctx, native, &args)?;
                        ctx.set_register(*dst, result)?;
                        Ok(InstructionResult::Continue)
                    }
                    Value::Function(closure) => Ok(InstructionResult::Call {
                        closure,
                        args,
                        return_reg: *dst,
                    }),
                    other => Err(VmError::type_error(format!(
                        "{} is not a function",
                        other.type_name()
                    ))),
                }
            }

            Instruction::Return { src } => {
                let value = ctx.get_register(*src)?.clone();
                Ok(InstructionResult::Return(value))
            }

            Instruction::ReturnUndefined => Ok(InstructionResult::Return(Value::undefined())),

            Instruction::Jump { offset } => Ok(InstructionResult::Jump(offset.0)),

            Instruction::Throw { src } => {
                let value = ctx.get_register(*src)?.clone();
                let stack = capture_stack_from(ctx, 0)?.into_frames();
                Err(VmError::exception(value, stack))
            }

            Instruction::TryStart { catch_offset } => {
                let catch_pc = ctx
                    .pc()
                    .checked_add_signed(catch_offset.0 as isize)
                    .ok_or_else(|| VmError::internal("catch offset out of range"))?;
                ctx.push_try(catch_pc);
                Ok(InstructionResult::Continue)
            }

            Instruction::TryEnd => {
                ctx.pop_try_for_current_frame();
                Ok(InstructionResult::Continue)
            }

            Instruction::Catch { dst } => {
                let exception = ctx.take_exception().unwrap_or_default();
                ctx.set_register(*dst, exception)?;
                Ok(InstructionResult::Continue)
            }
        }
    }

    /// Call a native function inside its own frame
    fn call_native(
        &mut self,
        ctx: &mut VmContext,
        native: NativeFunction,
        args: &[Value],
    ) -> VmResult<Value> {
        ctx.push_native_frame(native.name)?;
        let result = (native.func)(ctx, args);
        ctx.pop_frame();
        result
    }
}

fn constant_name(module: &Module, index: u32) -> VmResult<&str> {
    module
        .constants
        .get(index)
        .and_then(Constant::as_string)
        .ok_or_else(|| VmError::internal(format!("expected string constant at {}", index)))
}
