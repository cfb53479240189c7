//! VM runtime - the main entry point
//!
//! The runtime manages module loading, context creation, and execution.

use dashmap::DashMap;
use std::sync::Arc;

use marten_vm_bytecode::Module;
use tracing::debug;

use crate::context::{DEFAULT_MAX_STACK_DEPTH, OutputSink, VmContext};
use crate::error::VmResult;
use crate::interpreter::Interpreter;
use crate::intrinsics;
use crate::memory::MemoryManager;
use crate::value::Value;

/// The VM runtime
///
/// It is `Send + Sync` and can be shared across threads; each execution
/// gets its own [`VmContext`].
pub struct VmRuntime {
    /// Loaded modules
    modules: DashMap<String, Arc<Module>>,
    /// Memory accounting shared by all contexts
    memory_manager: Arc<MemoryManager>,
    /// Destination of `print` for new contexts
    output: Option<OutputSink>,
    /// Runtime configuration
    config: RuntimeConfig,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum stack depth
    pub max_stack_depth: usize,
    /// Maximum heap size in bytes
    pub max_heap_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_heap_size: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl VmRuntime {
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            modules: DashMap::new(),
            memory_manager: Arc::new(MemoryManager::new(config.max_heap_size)),
            output: None,
            config,
        }
    }

    /// Route `print` output of contexts created from now on
    pub fn set_output(&mut self, output: OutputSink) {
        self.output = Some(output);
    }

    /// Register a module under its source URL
    pub fn load_module(&self, module: Module) -> Arc<Module> {
        let url = module.source_url.clone();
        debug!(url = %url, functions = module.functions.len(), "loading module");
        let module = Arc::new(module);
        self.modules.insert(url, Arc::clone(&module));
        module
    }

    /// Get a loaded module by URL
    pub fn get_module(&self, url: &str) -> Option<Arc<Module>> {
        self.modules.get(url).map(|m| Arc::clone(m.value()))
    }

    /// Create a new execution context with the built-in globals
    pub fn create_context(&self) -> VmContext {
        let mut ctx = VmContext::new(Arc::clone(&self.memory_manager));
        ctx.set_max_stack_depth(self.config.max_stack_depth);
        if let Some(output) = &self.output {
            ctx.set_output(Arc::clone(output));
        }
        intrinsics::install(&mut ctx);
        ctx
    }

    /// Load and execute a module in a fresh context
    pub fn execute_module(&self, module: Module) -> VmResult<Value> {
        let module = self.load_module(module);
        let mut ctx = self.create_context();
        self.execute_module_with_context(module, &mut ctx)
    }

    /// Execute a loaded module with an existing context
    pub fn execute_module_with_context(
        &self,
        module: Arc<Module>,
        ctx: &mut VmContext,
    ) -> VmResult<Value> {
        let mut interpreter = Interpreter::new();
        let result = interpreter.execute(module, ctx);
        debug!(instructions = interpreter.executed(), ok = result.is_ok(), "execution finished");
        result
    }

    /// Memory manager shared by this runtime's contexts
    pub fn memory_manager(&self) -> &Arc<MemoryManager> {
        &self.memory_manager
    }

    /// Get runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get number of loaded modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl Default for VmRuntime {
    fn default() -> Self {
        Self::new()
    }
}
