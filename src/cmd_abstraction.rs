//! Running the lookup table compiler.
//!
//! Both programs finish by handing a freshly written text map to Postfix's
//! `postmap`, which rebuilds the indexed database next to it
//! (`virtual_trap` -> `virtual_trap.db`). The call is always
//! `postmap [type:]path`, run to completion before the program exits.
//!
//! postmap reads the map from stdin when no file is named, so stdin is
//! closed to keep a misconfigured call from hanging a cron job. Its
//! diagnostics go to stderr; [`CommandOutput::combined`] merges both
//! streams for the single message the programs print on failure.
//!
//! [`CommandExecutor`] is mocked in tests, where postmap is usually not
//! installed.

use anyhow::Result;
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// The exit code, if available
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Stdout and stderr joined the way a terminal would show them
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs an external command to completion
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with the given arguments and wait for it.
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Spawns the command with [`std::process::Command`]
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}
