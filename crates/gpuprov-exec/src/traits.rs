//! Execution and transfer trait definitions

use async_trait::async_trait;
use gpuprov_core::{ProvisionError, ProvisionResult};
use std::path::Path;

/// Captured output of a completed command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout, for tests and stubs
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given stderr, for tests and stubs
    pub fn failed(stderr: &str) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Runs external commands on the node
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, capturing output
    ///
    /// Returns Err only when the command could not be started; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    async fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput>;

    /// Run a command and treat a non-zero exit as an error
    async fn run_checked(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
        let output = self.run(program, args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(ProvisionError::Command(format!(
                "'{}' failed: {}",
                program,
                output.stderr.trim()
            )))
        }
    }
}

/// Fetches artifacts from the content distribution network
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download a URL to a local path
    async fn fetch(&self, url: &str, dest: &Path) -> ProvisionResult<()>;

    /// Probe a URL for existence without downloading it
    async fn exists(&self, url: &str) -> bool;
}
