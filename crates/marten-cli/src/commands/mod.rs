//! CLI command implementations.

pub mod disasm;
pub mod run;

use anyhow::{Context, Result};
use marten_vm_bytecode::Module;
use std::path::Path;

/// Read a bytecode module, binary container or JSON.
pub fn load_module(path: &Path) -> Result<Module> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Module::load(&bytes).with_context(|| format!("Failed to load module {}", path.display()))
}
