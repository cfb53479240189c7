//! Configuration file parsing for marten.toml.

use marten_vm_core::RuntimeConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file names searched for, in order
const CONFIG_NAMES: &[&str] = &["marten.toml", ".martenrc.toml"];

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// VM limits
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// `[runtime]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Heap limit in bytes
    pub max_heap_size: Option<usize>,

    /// Maximum number of active frames
    pub max_stack_depth: Option<usize>,
}

/// Limits given on the command line; these win over the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub max_heap_size: Option<usize>,
    pub max_stack_depth: Option<usize>,
}

impl Config {
    /// Resolve the runtime configuration: CLI flag, then file, then default.
    pub fn runtime_config(&self, overrides: Overrides) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        RuntimeConfig {
            max_heap_size: overrides
                .max_heap_size
                .or(self.runtime.max_heap_size)
                .unwrap_or(defaults.max_heap_size),
            max_stack_depth: overrides
                .max_stack_depth
                .or(self.runtime.max_stack_depth)
                .unwrap_or(defaults.max_stack_depth),
        }
    }
}

/// Load configuration from an explicit file, or search upwards from the
/// current directory. No file found means defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => read_config(path),
        None => {
            let cwd = std::env::current_dir()?;
            match find_config_file(&cwd) {
                Some(path) => read_config(&path),
                None => Ok(Config::default()),
            }
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Search `start` and its ancestors for a config file.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.is_file() {
                return Some(path);
            }
        }
        dir = current.parent();
    }
    None
}
