//! Bytecode module format

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::constant::ConstantPool;
use crate::error::{BytecodeError, Result};
use crate::function::Function;
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// Size of the binary container header: magic, version, body length
const HEADER_LEN: usize = 16;

/// A compiled bytecode module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Source URL/path, reported in stack frames
    pub source_url: String,

    /// Constant pool (shared across all functions)
    #[serde(default)]
    pub constants: ConstantPool,

    /// Functions defined in this module
    pub functions: Vec<Function>,

    /// Entry point function index
    #[serde(default)]
    pub entry_point: u32,
}

impl Module {
    /// Create a new module builder
    pub fn builder(source_url: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(source_url)
    }

    /// Serialize module to the binary container
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data = serde_json::to_vec(self)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + data.len());
        bytes.extend_from_slice(&BYTECODE_MAGIC);
        bytes.extend_from_slice(&BYTECODE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);

        Ok(bytes)
    }

    /// Deserialize module from the binary container
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(BytecodeError::UnexpectedEnd);
        }

        if bytes[0..8] != BYTECODE_MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }

        let version = read_u32(&bytes[8..12]);
        if version != BYTECODE_VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }

        let data_len = read_u32(&bytes[12..16]) as usize;
        let body = bytes
            .get(HEADER_LEN..HEADER_LEN + data_len)
            .ok_or(BytecodeError::UnexpectedEnd)?;

        let module: Module = serde_json::from_slice(body)?;
        module.validate()?;
        Ok(module)
    }

    /// Parse a module from its JSON form (hand-written or tool-generated)
    pub fn from_json(text: &str) -> Result<Self> {
        let module: Module = serde_json::from_str(text)?;
        module.validate()?;
        Ok(module)
    }

    /// Render the module as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a module from either the binary container or JSON
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&BYTECODE_MAGIC) {
            Self::from_bytes(bytes)
        } else {
            let module: Module = serde_json::from_slice(bytes)?;
            module.validate()?;
            Ok(module)
        }
    }

    /// Write module to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Read module from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::load(&bytes)
    }

    /// Get the entry point function
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.get(self.entry_point as usize)
    }

    /// Get a function by index
    pub fn function(&self, index: u32) -> Option<&Function> {
        self.functions.get(index as usize)
    }

    fn validate(&self) -> Result<()> {
        if self.entry_function().is_none() {
            return Err(BytecodeError::InvalidEntryPoint(self.entry_point));
        }

        for (index, function) in self.functions.iter().enumerate() {
            if let Some(map) = &function.source_map
                && !map.is_ordered()
            {
                return Err(BytecodeError::UnsortedSourceMap {
                    function: index as u32,
                });
            }
        }
        Ok(())
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Builder for creating modules
#[derive(Debug)]
pub struct ModuleBuilder {
    source_url: String,
    constants: ConstantPool,
    functions: Vec<Function>,
    entry_point: u32,
}

impl ModuleBuilder {
    /// Create a new module builder
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            constants: ConstantPool::new(),
            functions: Vec::new(),
            entry_point: 0,
        }
    }

    /// Get mutable reference to constant pool
    pub fn constants_mut(&mut self) -> &mut ConstantPool {
        &mut self.constants
    }

    /// Add a function, returns its index
    pub fn add_function(&mut self, function: Function) -> u32 {
        let idx = self.functions.len() as u32;
        self.functions.push(function);
        idx
    }

    /// Set entry point function index
    pub fn entry_point(mut self, index: u32) -> Self {
        self.entry_point = index;
        self
    }

    /// Build the module
    pub fn build(self) -> Module {
        Module {
            source_url: self.source_url,
            constants: self.constants,
            functions: self.functions,
            entry_point: self.entry_point,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;
    use crate::function::SourceMapEntry;
    use crate::instruction::Instruction;
    use crate::operand::Register;

    fn sample_module() -> Module {
        let mut builder = Module::builder("test/call-stack.js");
        builder.constants_mut().add_string("print");

        let func = Function::builder()
            .name("global")
            .register_count(1)
            .instruction_at(Instruction::LoadInt32 { dst: Register(0), value: 7 }, 1, 1)
            .instruction(Instruction::Return { src: Register(0) })
            .build();
        builder.add_function(func);

        builder.build()
    }

    #[test]
    fn test_module_binary_container() {
        let module = sample_module();

        let bytes = module.to_bytes().unwrap();
        assert_eq!(&bytes[0..8], &BYTECODE_MAGIC);

        let restored = Module::from_bytes(&bytes).unwrap();
        assert_eq!(restored.source_url, "test/call-stack.js");
        assert_eq!(restored.constants.len(), 1);
        assert_eq!(restored.functions.len(), 1);
        assert_eq!(restored.functions[0].position_at(1).map(|e| e.line), Some(1));
    }

    #[test]
    fn test_write_then_read_through_io() {
        let mut buffer = Vec::new();
        sample_module().write_to(&mut buffer).unwrap();

        let restored = Module::read_from(&mut buffer.as_slice()).unwrap();
        assert_eq!(restored.functions[0].instructions.len(), 2);

        let json = restored.to_json().unwrap();
        let again = Module::load(json.as_bytes()).unwrap();
        assert_eq!(again.constants.get(0), Some(&Constant::String("print".into())));
    }

    #[test]
    fn test_invalid_magic() {
        let bytes = b"INVALID\0........";
        let result = Module::from_bytes(bytes);
        assert!(matches!(result, Err(BytecodeError::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = sample_module().to_bytes().unwrap();
        bytes[8..12].copy_from_slice(&99u32.to_le_bytes());
        let result = Module::from_bytes(&bytes);
        assert!(matches!(result, Err(BytecodeError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_truncated_body() {
        let bytes = sample_module().to_bytes().unwrap();
        let result = Module::from_bytes(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(BytecodeError::UnexpectedEnd)));
    }

    #[test]
    fn test_load_accepts_json() {
        let text = r#"{
            "source_url": "inline.js",
            "functions": [
                { "name": "global", "register_count": 1, "instructions": ["ReturnUndefined"] }
            ]
        }"#;

        let module = Module::load(text.as_bytes()).unwrap();
        assert_eq!(module.source_url, "inline.js");
        assert_eq!(module.entry_function().unwrap().display_name(), "global");
    }

    #[test]
    fn test_unsorted_source_map_rejected() {
        let text = r#"{
            "source_url": "x.js",
            "functions": [
                { "register_count": 0, "instructions": ["ReturnUndefined"] },
                {
                    "register_count": 0,
                    "instructions": ["ReturnUndefined", "ReturnUndefined", "ReturnUndefined"],
                    "source_map": { "entries": [
                        { "instruction_index": 2, "line": 30, "column": 3 },
                        { "instruction_index": 0, "line": 10, "column": 1 },
                        { "instruction_index": 1, "line": 20, "column": 2 }
                    ] }
                }
            ]
        }"#;

        let result = Module::from_json(text);
        assert!(matches!(
            result,
            Err(BytecodeError::UnsortedSourceMap { function: 1 })
        ));
    }

    #[test]
    fn test_duplicate_source_map_index_rejected() {
        let mut module = sample_module();
        let map = module.functions[0].source_map.get_or_insert_with(Default::default);
        map.entries = vec![
            SourceMapEntry { instruction_index: 0, line: 1, column: 1 },
            SourceMapEntry { instruction_index: 0, line: 2, column: 5 },
        ];

        let bytes = module.to_bytes().unwrap();
        assert!(matches!(
            Module::from_bytes(&bytes),
            Err(BytecodeError::UnsortedSourceMap { function: 0 })
        ));
    }

    #[test]
    fn test_builder_entry_point() {
        let mut builder = Module::builder("entry.js");
        builder.add_function(Function::builder().name("helper").build());
        let main = builder.add_function(Function::builder().name("main").build());

        let bytes = builder.entry_point(main).build().to_bytes().unwrap();

        let module = Module::from_bytes(&bytes).unwrap();
        assert_eq!(module.entry_point, 1);
        assert_eq!(module.entry_function().unwrap().display_name(), "main");
    }

    #[test]
    fn test_entry_point_out_of_range() {
        let text = r#"{ "source_url": "x.js", "functions": [], "entry_point": 0 }"#;
        let result = Module::from_json(text);
        assert!(matches!(result, Err(BytecodeError::InvalidEntryPoint(0))));
    }
}
