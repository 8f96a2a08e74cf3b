//! Subprocess execution for CLI-based federation
//!
//! Kept behind a trait so resolution can be tested without a real
//! cloud CLI on the machine.

use async_trait::async_trait;
use std::process::Stdio;

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit status was zero
    pub success: bool,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

/// Runs external programs
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// An `io::ErrorKind::NotFound` error means the program is not installed.
    async fn output(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// Executes commands on the local machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn output(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
