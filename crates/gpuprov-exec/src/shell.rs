//! System command runner backed by OS processes

use crate::traits::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use gpuprov_core::{ProvisionError, ProvisionResult};
use tokio::process::Command;
use tracing::debug;

/// Runs commands directly on the node
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
        debug!(program, ?args, "Running command");

        let output = Command::new(program).args(args).output().await.map_err(|e| {
            ProvisionError::Command(format!("Failed to start '{}': {}", program, e))
        })?;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success {
            debug!(
                program,
                stderr = %result.stderr.trim(),
                "Command exited non-zero"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let runner = SystemRunner::new();
        let output = runner.run("echo", &["hello"]).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let runner = SystemRunner::new();
        let output = runner.run("false", &[]).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let runner = SystemRunner::new();
        let err = runner
            .run("definitely-not-a-real-program", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Command(_)));
    }
}
