//! Function definitions

use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;

/// Name reported for functions without a declared or inferred name
pub const ANONYMOUS_FUNCTION_NAME: &str = "(anonymous)";

/// A bytecode function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name (None for anonymous)
    #[serde(default)]
    pub name: Option<String>,

    /// Number of parameters
    #[serde(default)]
    pub param_count: u8,

    /// Number of registers needed
    pub register_count: u16,

    /// Bytecode instructions
    pub instructions: Vec<Instruction>,

    /// Source location mapping (instruction index -> line/column)
    #[serde(default)]
    pub source_map: Option<SourceMap>,
}

impl Function {
    /// Create a new function builder
    pub fn builder() -> FunctionBuilder {
        FunctionBuilder::new()
    }

    /// Get the function name or the anonymous placeholder
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => ANONYMOUS_FUNCTION_NAME,
        }
    }

    /// Source position of the instruction at `pc`, if the function is mapped
    pub fn position_at(&self, pc: usize) -> Option<&SourceMapEntry> {
        self.source_map.as_ref()?.find(pc as u32)
    }
}

/// Builder for creating functions
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    name: Option<String>,
    param_count: u8,
    register_count: u16,
    instructions: Vec<Instruction>,
    source_map: Option<SourceMap>,
}

impl FunctionBuilder {
    /// Create a new function builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set function name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set parameter count
    pub fn param_count(mut self, count: u8) -> Self {
        self.param_count = count;
        self
    }

    /// Set register count
    pub fn register_count(mut self, count: u16) -> Self {
        self.register_count = count;
        self
    }

    /// Add a single instruction without a source position
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Add an instruction and map it to `line:column`
    pub fn instruction_at(mut self, instruction: Instruction, line: u32, column: u32) -> Self {
        let index = self.instructions.len() as u32;
        self.source_map
            .get_or_insert_with(SourceMap::new)
            .add(index, line, column);
        self.instructions.push(instruction);
        self
    }

    /// Build the function
    ///
    /// The register file always covers the parameters.
    pub fn build(self) -> Function {
        Function {
            name: self.name,
            param_count: self.param_count,
            register_count: self.register_count.max(self.param_count as u16),
            instructions: self.instructions,
            source_map: self.source_map,
        }
    }
}

/// Source location mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    /// Entries mapping instruction index to source location, sorted by index
    pub entries: Vec<SourceMapEntry>,
}

/// A single source map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Instruction index
    pub instruction_index: u32,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl SourceMap {
    /// Create a new empty source map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping entry
    ///
    /// Entries must be added in instruction order; see [`SourceMap::is_ordered`].
    pub fn add(&mut self, instruction_index: u32, line: u32, column: u32) {
        self.entries.push(SourceMapEntry {
            instruction_index,
            line,
            column,
        });
    }

    /// Check that entries are strictly increasing by instruction index,
    /// which [`SourceMap::find`] relies on.
    pub fn is_ordered(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| pair[0].instruction_index < pair[1].instruction_index)
    }

    /// Find source location for instruction index
    ///
    /// Unmapped instructions inherit the nearest preceding entry.
    pub fn find(&self, instruction_index: u32) -> Option<&SourceMapEntry> {
        let idx = self
            .entries
            .binary_search_by_key(&instruction_index, |e| e.instruction_index);

        match idx {
            Ok(i) => Some(&self.entries[i]),
            Err(i) if i > 0 => Some(&self.entries[i - 1]),
            _ => None,
        }
    }
}
