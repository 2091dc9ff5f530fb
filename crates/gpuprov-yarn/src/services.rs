//! Scheduler service restarts
//!
//! Configuration changes only take effect after a restart, but the
//! procedure must never start a service the image keeps stopped (the
//! primary starts them in its own order). So: restart if active, leave
//! alone otherwise.

use gpuprov_core::ProvisionResult;
use gpuprov_exec::CommandRunner;
use tracing::{debug, info};

/// Scheduler resource-manager service
pub const RESOURCE_MANAGER: &str = "hadoop-yarn-resourcemanager";
/// Per-node node-manager service
pub const NODE_MANAGER: &str = "hadoop-yarn-nodemanager";

/// Restart a service only when it is already running
pub async fn restart_if_active(runner: &dyn CommandRunner, service: &str) -> ProvisionResult<()> {
    let probe = runner
        .run("systemctl", &["is-active", "--quiet", service])
        .await;
    let active = matches!(probe, Ok(ref output) if output.success);

    if active {
        info!(service, "Restarting service to pick up configuration");
        runner
            .run_checked("systemctl", &["restart", service])
            .await?;
    } else {
        debug!(service, "Service not active, leaving it stopped");
    }
    Ok(())
}

/// Restart both scheduler services where they are running
pub async fn restart_scheduler_services(runner: &dyn CommandRunner) -> ProvisionResult<()> {
    restart_if_active(runner, RESOURCE_MANAGER).await?;
    restart_if_active(runner, NODE_MANAGER).await?;
    Ok(())
}
