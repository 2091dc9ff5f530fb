//! Installer dispatch

use crate::{DebianInstaller, Installer, RpmInstaller, UbuntuInstaller};
use gpuprov_core::{OsFamily, ProvisioningContext, ProvisionResult};
use gpuprov_exec::{CommandRunner, Fetcher};
use std::sync::Arc;
use tracing::info;

/// Select the installation strategy for a platform
///
/// The family enum is closed; unsupported platforms were rejected during
/// detection and cannot reach this point.
pub fn installer_for(
    family: OsFamily,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
) -> Box<dyn Installer> {
    match family {
        OsFamily::Debian => Box::new(DebianInstaller::new(runner, fetcher)),
        OsFamily::Ubuntu => Box::new(UbuntuInstaller::new(runner, fetcher)),
        OsFamily::Rocky => Box::new(RpmInstaller::new(runner, fetcher)),
    }
}

/// Run the full installation branch for this node
pub async fn install(
    ctx: &ProvisioningContext,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
) -> ProvisionResult<()> {
    let installer = installer_for(ctx.platform.family, runner.clone(), fetcher);
    info!(strategy = installer.name(), "Installing GPU driver stack");

    installer.install_driver(ctx).await?;
    installer.install_toolkit(ctx).await?;
    installer.register_header_sync(ctx).await?;

    // Every branch converges here: freshly installed libraries must be
    // visible to the dynamic linker.
    runner.run_checked("ldconfig", &[]).await?;
    Ok(())
}
