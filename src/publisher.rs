//! Compiling lookup files with postmap.
//!
//! A failed compile is reported but never undoes the file that was written:
//! the MTA keeps using the previous database until the next successful run.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cmd_abstraction::CommandExecutor;

/// Outcome of one postmap invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub success: bool,
    /// Combined stdout/stderr of the tool, or the spawn error
    pub output: String,
}

/// Runs the lookup table compiler against freshly written files
#[derive(Debug, Clone)]
pub struct Publisher {
    postmap: PathBuf,
    map_type: Option<String>,
}

impl Publisher {
    pub fn new(postmap: impl Into<PathBuf>) -> Self {
        Self {
            postmap: postmap.into(),
            map_type: None,
        }
    }

    /// Prefix the map argument with a table type, e.g. `hash`
    pub fn with_map_type(mut self, map_type: Option<&str>) -> Self {
        self.map_type = map_type.map(str::to_string);
        self
    }

    /// `postmap` argument for a file: `hash:/etc/postfix/virtual_trap`
    pub fn map_argument(&self, path: &Path) -> String {
        match &self.map_type {
            Some(map_type) => format!("{}:{}", map_type, path.display()),
            None => path.display().to_string(),
        }
    }

    /// Compile `path` using an injected CommandExecutor
    pub fn publish_with_executor<E: CommandExecutor + ?Sized>(
        &self,
        executor: &E,
        path: &Path,
    ) -> PublishReport {
        let cmd = self.postmap.to_string_lossy();
        let args = vec![self.map_argument(path)];
        debug!("Running {} {}", cmd, args[0]);

        match executor.execute(&cmd, &args) {
            Ok(output) if output.success => PublishReport {
                success: true,
                output: output.combined(),
            },
            Ok(output) => {
                warn!(
                    "{} exited with status {}",
                    cmd,
                    output
                        .code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                );
                PublishReport {
                    success: false,
                    output: output.combined(),
                }
            }
            Err(e) => {
                warn!("Failed to run {}: {}", cmd, e);
                PublishReport {
                    success: false,
                    output: e.to_string(),
                }
            }
        }
    }
}
