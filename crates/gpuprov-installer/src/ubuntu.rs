//! Ubuntu installation workflow
//!
//! Ubuntu installs from the vendor's release-specific local repository
//! package: driver and toolkit then come down as ordinary apt packages.

use crate::traits::Installer;
use async_trait::async_trait;
use gpuprov_core::{ProvisioningContext, ProvisionResult, VersionSet, TOOLKIT_URL_BASE};
use gpuprov_exec::{fetch_with_retries, run_checked_with_retries, CommandRunner, Fetcher};
use gpuprov_kernel::register_header_sync;
use std::sync::Arc;
use tracing::info;

/// Where apt repository pins live
const PIN_DEST: &str = "/etc/apt/preferences.d/cuda-repository-pin-600";

/// System keyring directory apt reads signing keys from
const KEYRING_DIR: &str = "/usr/share/keyrings/";

pub struct UbuntuInstaller {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl UbuntuInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { runner, fetcher }
    }

    /// Vendor repo identifier for this release, e.g. "ubuntu1804"
    fn repo_release(ctx: &ProvisioningContext) -> String {
        format!("ubuntu{}04", ctx.platform.release)
    }

    /// Name of the local repository the installer package registers
    fn local_repo_name(ctx: &ProvisioningContext) -> String {
        format!(
            "cuda-repo-{}-{}-local",
            Self::repo_release(ctx),
            ctx.versions.toolkit_major_dashed()
        )
    }

    fn local_installer_url(ctx: &ProvisioningContext) -> String {
        let VersionSet {
            driver, toolkit, ..
        } = &ctx.versions;
        format!(
            "{}/{}/local_installers/{}_{}-{}-1_amd64.deb",
            TOOLKIT_URL_BASE,
            toolkit,
            Self::local_repo_name(ctx),
            toolkit,
            driver
        )
    }

    async fn kernel_release(&self) -> ProvisionResult<String> {
        let output = self.runner.run_checked("uname", &["-r"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl Installer for UbuntuInstaller {
    async fn install_driver(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        info!(release = %ctx.platform.release, driver = %ctx.versions.driver, "Installing driver");

        let headers = format!("linux-headers-{}", self.kernel_release().await?);
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "apt-get",
            &["install", "-y", &headers],
        )
        .await?;

        let repo = Self::repo_release(ctx);
        let pin_url = format!(
            "https://developer.download.nvidia.com/compute/cuda/repos/{}/x86_64/cuda-{}.pin",
            repo, repo
        );
        fetch_with_retries(
            self.fetcher.as_ref(),
            &ctx.retry,
            &pin_url,
            std::path::Path::new(PIN_DEST),
        )
        .await?;

        let installer_url = Self::local_installer_url(ctx);
        let dest = ctx
            .paths
            .download_dir
            .join(gpuprov_exec::url_file_name(&installer_url));
        fetch_with_retries(self.fetcher.as_ref(), &ctx.retry, &installer_url, &dest).await?;
        self.runner
            .run_checked("dpkg", &["-i", &dest.to_string_lossy()])
            .await?;

        // The local repo ships its signing key; apt only trusts it from the
        // system keyring directory.
        let copy_key = format!(
            "cp /var/{}/cuda-*-keyring.gpg {}",
            Self::local_repo_name(ctx),
            KEYRING_DIR
        );
        self.runner.run_checked("sh", &["-c", &copy_key]).await?;

        run_checked_with_retries(self.runner.as_ref(), &ctx.retry, "apt-get", &["update"]).await?;

        let drivers_package = format!("cuda-drivers-{}", ctx.versions.driver_major());
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "apt-get",
            &["install", "-y", &drivers_package],
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
            "apt-get",
            &["install", "-y", &toolkit_package],
        )
        .await?;
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
        "ubuntu"
    }
}
