//! Shared module builders for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use marten_vm_bytecode::{ConstantIndex, Function, FunctionIndex, Instruction, Module, Register};
use marten_vm_core::{RuntimeConfig, VmRuntime};
use parking_lot::Mutex;

pub const FIXTURE_URL: &str = "/test/marten/call-stack.js";

/// Runtime whose `print` output is collected into the returned buffer
pub fn capturing_runtime(config: RuntimeConfig) -> (VmRuntime, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let mut runtime = VmRuntime::with_config(config);
    runtime.set_output(Arc::new(move |line: &str| sink.lock().push(line.to_string())));
    (runtime, lines)
}

fn r(index: u8) -> Register {
    Register(index)
}

fn call(dst: u8, func: u8, argc: u8) -> Instruction {
    Instruction::Call {
        dst: r(dst),
        func: r(func),
        argc,
    }
}

/// Bytecode for this script (line numbers as in the source):
///
/// ```text
///  1 // RUN: marten run %s
///  2 // REQUIRES: exception_on_oom
///  3 "use strict";
///  4
///  5 function c() {
///  6   return MartenInternal.getCallStack();
///  7 }
///  8
///  9 function b() {
/// 10   var f = function() {
/// 11     return c();
/// 12   };
/// 13   return f();
/// 14 }
/// 15
/// 16 function a() {
/// 17   return b();
/// 18 }
/// 19
/// 20 print(a());
/// ```
pub fn fixture_module() -> Module {
    let mut builder = Module::builder(FIXTURE_URL);
    let constants = builder.constants_mut();
    let k_c = ConstantIndex(constants.add_string("c"));
    let k_b = ConstantIndex(constants.add_string("b"));
    let k_a = ConstantIndex(constants.add_string("a"));
    let k_print = ConstantIndex(constants.add_string("print"));
    let k_internal = ConstantIndex(constants.add_string("MartenInternal"));
    let k_get_call_stack = ConstantIndex(constants.add_string("getCallStack"));

    // 0: global code
    builder.add_function(
        Function::builder()
            .name("global")
            .register_count(2)
            .instruction_at(Instruction::Closure { dst: r(0), func: FunctionIndex(1) }, 5, 1)
            .instruction(Instruction::SetGlobal { name: k_c, src: r(0) })
            .instruction_at(Instruction::Closure { dst: r(0), func: FunctionIndex(2) }, 9, 1)
            .instruction(Instruction::SetGlobal { name: k_b, src: r(0) })
            .instruction_at(Instruction::Closure { dst: r(0), func: FunctionIndex(4) }, 16, 1)
            .instruction(Instruction::SetGlobal { name: k_a, src: r(0) })
            .instruction_at(Instruction::GetGlobal { dst: r(0), name: k_print }, 20, 1)
            .instruction_at(Instruction::GetGlobal { dst: r(1), name: k_a }, 20, 7)
            .instruction_at(call(1, 1, 0), 20, 8)
            .instruction_at(call(0, 0, 1), 20, 6)
            .instruction(Instruction::ReturnUndefined)
            .build(),
    );

    // 1: function c
    builder.add_function(
        Function::builder()
            .name("c")
            .register_count(2)
            .instruction_at(Instruction::GetGlobal { dst: r(0), name: k_internal }, 6, 10)
            .instruction_at(
                Instruction::GetPropConst {
                    dst: r(1),
                    obj: r(0),
                    name: k_get_call_stack,
                },
                6,
                24,
            )
            .instruction_at(call(0, 1, 0), 6, 37)
            .instruction_at(Instruction::Return { src: r(0) }, 6, 3)
            .build(),
    );

    // 2: function b
    builder.add_function(
        Function::builder()
            .name("b")
            .register_count(2)
            .instruction_at(Instruction::Closure { dst: r(1), func: FunctionIndex(3) }, 10, 11)
            .instruction_at(call(0, 1, 0), 13, 11)
            .instruction_at(Instruction::Return { src: r(0) }, 13, 3)
            .build(),
    );

    // 3: the function expression bound to `f` (name inferred from the binding)
    builder.add_function(
        Function::builder()
            .name("f")
            .register_count(1)
            .instruction_at(Instruction::GetGlobal { dst: r(0), name: k_c }, 11, 12)
            .instruction_at(call(0, 0, 0), 11, 13)
            .instruction_at(Instruction::Return { src: r(0) }, 11, 5)
            .build(),
    );

    // 4: function a
    builder.add_function(
        Function::builder()
            .name("a")
            .register_count(1)
            .instruction_at(Instruction::GetGlobal { dst: r(0), name: k_b }, 17, 10)
            .instruction_at(call(0, 0, 0), 17, 11)
            .instruction_at(Instruction::Return { src: r(0) }, 17, 3)
            .build(),
    );

    builder.build()
}

/// A chain `global -> f1 -> .. -> f{depth-1}` whose innermost function
/// returns `MartenInternal.getCallStack()` and whose entry prints it.
///
/// Function `k` calls at line `k + 1`, column `k + 1`. Unnamed functions
/// are emitted for every index in `anonymous`.
pub fn chain_module(depth: u32, anonymous: &[u32]) -> Module {
    assert!(depth >= 1);
    let mut builder = Module::builder("chain.js");
    let constants = builder.constants_mut();
    let k_print = ConstantIndex(constants.add_string("print"));
    let k_internal = ConstantIndex(constants.add_string("MartenInternal"));
    let k_get_call_stack = ConstantIndex(constants.add_string("getCallStack"));

    for k in 0..depth {
        let line = k + 1;
        let column = k + 1;
        let mut func = Function::builder().register_count(3);
        if !anonymous.contains(&k) {
            func = func.name(if k == 0 { "global".to_string() } else { format!("f{}", k) });
        }

        func = if k + 1 < depth {
            func.instruction(Instruction::Closure {
                dst: r(1),
                func: FunctionIndex(k + 1),
            })
            .instruction_at(call(1, 1, 0), line, column)
        } else {
            func.instruction(Instruction::GetGlobal { dst: r(0), name: k_internal })
                .instruction(Instruction::GetPropConst {
                    dst: r(1),
                    obj: r(0),
                    name: k_get_call_stack,
                })
                .instruction_at(call(1, 1, 0), line, column)
        };

        func = if k == 0 {
            func.instruction(Instruction::GetGlobal { dst: r(0), name: k_print })
                .instruction(Instruction::Move { dst: r(2), src: r(1) })
                .instruction(Instruction::Move { dst: r(1), src: r(0) })
                .instruction(call(0, 1, 1))
                .instruction(Instruction::Return { src: r(2) })
        } else {
            func.instruction(Instruction::Return { src: r(1) })
        };

        builder.add_function(func.build());
    }

    builder.build()
}
