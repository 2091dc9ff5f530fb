//! GPU metrics agent installation
//!
//! Optional, flag-gated monitoring agent reporting device utilization.
//! Never installed on a partitioned accelerator: the agent reads whole
//! devices and reports garbage for partitions.

use gpuprov_core::{ProvisioningContext, ProvisionResult};
use gpuprov_exec::{fetch_with_retries, run_checked_with_retries, CommandRunner, Fetcher};
use gpuprov_kernel::{register_unit, UnitSpec};
use std::sync::Arc;
use tracing::info;

/// Unit name the agent runs under
pub const AGENT_UNIT: &str = "gpu-metrics-agent.service";

const AGENT_BASE_URL: &str =
    "https://raw.githubusercontent.com/GoogleCloudPlatform/ml-on-gcp/master/dlvm/gcp-gpu-utilization-metrics";

const AGENT_FILES: [&str; 2] = ["requirements.txt", "report_gpu_metrics.py"];

pub struct AgentInstaller {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl AgentInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { runner, fetcher }
    }

    /// Install the agent and register its unit
    pub async fn install(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        if ctx.topology.partitioned {
            info!("Partitioned accelerator, skipping metrics agent");
            return Ok(());
        }

        let agent_dir = ctx.paths.bundle_dir.join("metrics-agent");
        std::fs::create_dir_all(&agent_dir)?;
        for file in AGENT_FILES {
            let url = format!("{}/{}", AGENT_BASE_URL, file);
            fetch_with_retries(
                self.fetcher.as_ref(),
                &ctx.retry,
                &url,
                &agent_dir.join(file),
            )
            .await?;
        }

        let requirements = agent_dir.join("requirements.txt");
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "pip3",
            &["install", "-r", &requirements.to_string_lossy()],
        )
        .await?;

        let mut spec = UnitSpec::boot_oneshot(
            AGENT_UNIT,
            "Report GPU utilization metrics",
            &format!(
                "/usr/bin/python3 {}",
                agent_dir.join("report_gpu_metrics.py").display()
            ),
        );
        spec.oneshot = false;
        register_unit(self.runner.as_ref(), &ctx.paths.systemd_unit_dir, &spec).await
    }
}
