//! Run command - execute a bytecode module.

use anyhow::Result;
use clap::Args;
use marten_vm_core::format::format_uncaught;
use marten_vm_core::{VmError, VmRuntime};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{Config, Overrides};

#[derive(Args)]
pub struct RunCommand {
    /// Bytecode module (`.mbc` container or `.json`)
    pub module: PathBuf,

    /// Heap limit in bytes
    #[arg(long = "max-heap", value_name = "BYTES")]
    pub max_heap: Option<usize>,

    /// Maximum number of active frames
    #[arg(long, value_name = "N")]
    pub max_stack_depth: Option<usize>,
}

impl RunCommand {
    pub fn run(&self, config: &Config) -> Result<ExitCode> {
        let module = super::load_module(&self.module)?;
        let runtime_config = config.runtime_config(Overrides {
            max_heap_size: self.max_heap,
            max_stack_depth: self.max_stack_depth,
        });
        tracing::debug!(?runtime_config, module = %self.module.display(), "running");

        let runtime = VmRuntime::with_config(runtime_config);
        match runtime.execute_module(module) {
            Ok(_) => Ok(ExitCode::SUCCESS),
            Err(err) => match uncaught_report(&err) {
                Some(report) => {
                    eprint!("{}", report);
                    Ok(ExitCode::FAILURE)
                }
                None => Err(anyhow::Error::new(err).context(failed(&self.module))),
            },
        }
    }
}

fn failed(path: &Path) -> String {
    format!("Failed to execute {}", path.display())
}

/// Text printed for an error that escaped the script.
///
/// Host-level failures (internal and bytecode errors) have no report and
/// are returned as command errors instead.
pub fn uncaught_report(err: &VmError) -> Option<String> {
    match err {
        VmError::Exception(thrown) => Some(format_uncaught(thrown)),
        err if err.is_catchable() => Some(format!("Uncaught {}\n", err)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marten_vm_core::{FormattedFrame, FrameLocation, Value};

    #[test]
    fn test_report_for_exception_includes_stack() {
        let err = VmError::exception(
            Value::string("boom"),
            vec![FormattedFrame {
                name: "main".to_string(),
                location: FrameLocation::Native,
            }],
        );

        assert_eq!(
            uncaught_report(&err).unwrap(),
            "Uncaught boom\n    at main: native\n"
        );
    }

    #[test]
    fn test_report_for_out_of_memory() {
        assert_eq!(
            uncaught_report(&VmError::OutOfMemory).unwrap(),
            "Uncaught RangeError: Out of memory\n"
        );
    }

    #[test]
    fn test_internal_error_has_no_report() {
        assert!(uncaught_report(&VmError::internal("no frame")).is_none());
    }
}
