//! Disasm command - list a module's constants and instructions.

use anyhow::Result;
use clap::Args;
use marten_vm_bytecode::{Constant, Module};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args)]
pub struct DisasmCommand {
    /// Bytecode module (`.mbc` container or `.json`)
    pub module: PathBuf,

    /// Print the module as JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

impl DisasmCommand {
    pub fn run(&self) -> Result<()> {
        let module = super::load_module(&self.module)?;
        if self.json {
            println!("{}", module.to_json()?);
        } else {
            print!("{}", disassemble(&module));
        }
        Ok(())
    }
}

/// Render every function with its instructions and source positions
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {} (entry f{})", module.source_url, module.entry_point);

    if !module.constants.is_empty() {
        let _ = writeln!(out, "constants:");
        for (i, constant) in module.constants.iter().enumerate() {
            match constant {
                Constant::Number(n) => {
                    let _ = writeln!(out, "  c{:<4} {}", i, n);
                }
                Constant::String(s) => {
                    let _ = writeln!(out, "  c{:<4} {:?}", i, s);
                }
            }
        }
    }

    for (index, function) in module.functions.iter().enumerate() {
        let _ = writeln!(
            out,
            "\nf{} {} (params {}, registers {}):",
            index,
            function.display_name(),
            function.param_count,
            function.register_count
        );
        for (pc, instruction) in function.instructions.iter().enumerate() {
            let line = format!("  {:04}  {}", pc, instruction);
            match function.position_at(pc) {
                Some(pos) if pos.instruction_index as usize == pc => {
                    let _ = writeln!(out, "{:<32} ; {}:{}", line, pos.line, pos.column);
                }
                _ => {
                    let _ = writeln!(out, "{}", line);
                }
            }
        }
    }

    out
}
