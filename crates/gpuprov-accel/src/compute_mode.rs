//! Compute mode configuration

use crate::detector::MANAGEMENT_TOOL;
use gpuprov_core::{AcceleratorTopology, ProvisionResult};
use gpuprov_exec::CommandRunner;
use tracing::{debug, info};

/// Put the accelerator into exclusive-process compute mode
///
/// Skipped on a partitioned accelerator: partitions are already isolated
/// per workload and the whole-device mode switch would fail.
pub async fn set_exclusive_mode(
    runner: &dyn CommandRunner,
    topology: &AcceleratorTopology,
) -> ProvisionResult<()> {
    if topology.partitioned {
        debug!("Partitioned accelerator, leaving compute mode unchanged");
        return Ok(());
    }
    info!("Setting exclusive-process compute mode");
    runner
        .run_checked(MANAGEMENT_TOOL, &["-c", "EXCLUSIVE_PROCESS"])
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpuprov_exec::CommandOutput;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));
            Ok(CommandOutput::ok(""))
        }
    }

    #[tokio::test]
    async fn test_sets_exclusive_mode_on_standard_topology() {
        let runner = RecordingRunner {
            calls: Mutex::new(Vec::new()),
        };
        set_exclusive_mode(&runner, &AcceleratorTopology::standard())
            .await
            .unwrap();
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec!["nvidia-smi -c EXCLUSIVE_PROCESS".to_string()]
        );
    }

    #[tokio::test]
    async fn test_partitioned_topology_is_untouched() {
        let runner = RecordingRunner {
            calls: Mutex::new(Vec::new()),
        };
        let topology = AcceleratorTopology::partitioned(2, Some(508), PathBuf::from("/tmp"));
        set_exclusive_mode(&runner, &topology).await.unwrap();
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
