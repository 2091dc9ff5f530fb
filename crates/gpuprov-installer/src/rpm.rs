//! RPM-family installation workflow
//!
//! The vendor repository carries a prebuilt kernel module stream, so this
//! branch never compiles against kernel headers; the pre-flight kernel
//! upgrade has already made sure the running kernel matches the
//! repositories.

use crate::traits::Installer;
use async_trait::async_trait;
use gpuprov_core::{ProvisioningContext, ProvisionResult};
use gpuprov_exec::{run_checked_with_retries, CommandRunner, Fetcher};
use gpuprov_kernel::register_header_sync;
use std::sync::Arc;
use tracing::info;

/// Module stream providing the prebuilt driver kernel module
const DRIVER_MODULE_STREAM: &str = "nvidia-driver:latest-dkms";

pub struct RpmInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl RpmInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, _fetcher: Arc<dyn Fetcher>) -> Self {
        Self { runner }
    }

    fn repo_url(ctx: &ProvisioningContext) -> String {
        format!(
            "https://developer.download.nvidia.com/compute/cuda/repos/rhel{}/x86_64/cuda-rhel{}.repo",
            ctx.platform.release, ctx.platform.release
        )
    }
}

#[async_trait]
impl Installer for RpmInstaller {
    async fn install_driver(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        info!(release = %ctx.platform.release, "Registering vendor repository");
        let repo_url = Self::repo_url(ctx);
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "dnf",
            &["config-manager", "--add-repo", &repo_url],
        )
        .await?;
        self.runner.run_checked("dnf", &["clean", "all"]).await?;

        info!(stream = DRIVER_MODULE_STREAM, "Installing driver module");
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "dnf",
            &["-y", "module", "install", DRIVER_MODULE_STREAM],
        )
        .await?;
        Ok(())
    }

    async fn install_toolkit(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        let toolkit_package = format!("cuda-toolkit-{}", ctx.versions.toolkit_major_dashed());
        info!(package = %toolkit_package, "Installing toolkit");
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "dnf",
            &["-y", "install", &toolkit_package],
        )
        .await?;

        self.runner.run_checked("modprobe", &["nvidia"]).await?;
        Ok(())
    }

    async fn register_header_sync(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        register_header_sync(
            self.runner.as_ref(),
            &ctx.paths.systemd_unit_dir,
            ctx.platform.family,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "rpm"
    }
}
