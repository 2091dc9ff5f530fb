//! Debian installation workflow
//!
//! Debian installs the vendor's `.run` bundles directly instead of the
//! packaged repository path Ubuntu uses: the packaged drivers lag too far
//! behind on Debian stable.

use crate::traits::Installer;
use async_trait::async_trait;
use gpuprov_core::{ProvisioningContext, ProvisionResult};
use gpuprov_exec::{
    fetch_with_retries, run_checked_with_retries, url_file_name, CommandRunner, Fetcher,
};
use gpuprov_kernel::register_header_sync;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Vendor package-signing keyring, installed before any repo access
const KEYRING_PACKAGE: &str = "cuda-keyring_1.1-1_all.deb";

/// deb822 sources file that carries the component list on release 12
const DEB822_SOURCES: &str = "/etc/apt/sources.list.d/debian.sources";

pub struct DebianInstaller {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl DebianInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { runner, fetcher }
    }

    async fn kernel_release(&self) -> ProvisionResult<String> {
        let output = self.runner.run_checked("uname", &["-r"]).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn install_kernel_headers(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        let headers = format!("linux-headers-{}", self.kernel_release().await?);
        run_checked_with_retries(
            self.runner.as_ref(),
            &ctx.retry,
            "apt-get",
            &["install", "-y", &headers],
        )
        .await?;
        Ok(())
    }

    async fn enable_contrib(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        if ctx.platform.release == "12" {
            // Release 12 moved the component list into a deb822 sources file
            self.runner
                .run_checked(
                    "sed",
                    &[
                        "-i",
                        "s/Components: main/Components: main contrib/",
                        DEB822_SOURCES,
                    ],
                )
                .await?;
        } else {
            self.runner
                .run_checked("apt-add-repository", &["-y", "contrib"])
                .await?;
        }
        Ok(())
    }

    async fn install_keyring(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        let url = format!(
            "https://developer.download.nvidia.com/compute/cuda/repos/debian{}/x86_64/{}",
            ctx.platform.release, KEYRING_PACKAGE
        );
        let dest = ctx.paths.download_dir.join(KEYRING_PACKAGE);
        fetch_with_retries(self.fetcher.as_ref(), &ctx.retry, &url, &dest).await?;
        self.runner
            .run_checked("dpkg", &["-i", &dest.to_string_lossy()])
            .await?;
        Ok(())
    }

    /// Download a vendor `.run` bundle and execute it silently
    async fn run_vendor_installer(
        &self,
        ctx: &ProvisioningContext,
        url: &str,
        extra_args: &[&str],
    ) -> ProvisionResult<()> {
        let dest: PathBuf = ctx.paths.download_dir.join(url_file_name(url));
        fetch_with_retries(self.fetcher.as_ref(), &ctx.retry, url, &dest).await?;

        let dest_str = dest.to_string_lossy().to_string();
        let mut args = vec![dest_str.as_str(), "--silent"];
        args.extend_from_slice(extra_args);
        self.runner.run_checked("bash", &args).await?;
        Ok(())
    }
}

#[async_trait]
impl Installer for DebianInstaller {
    async fn install_driver(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        info!(release = %ctx.platform.release, driver = %ctx.versions.driver, "Installing driver");

        self.install_kernel_headers(ctx).await?;
        self.enable_contrib(ctx).await?;
        run_checked_with_retries(self.runner.as_ref(), &ctx.retry, "apt-get", &["update"]).await?;

        if ctx.platform.release == "10" {
            // The stock OpenGL loader on release 10 conflicts with the
            // vendor driver's own libraries.
            run_checked_with_retries(
                self.runner.as_ref(),
                &ctx.retry,
                "apt-get",
                &["--purge", "remove", "-y", "libopengl0"],
            )
            .await?;
            run_checked_with_retries(
                self.runner.as_ref(),
                &ctx.retry,
                "apt-get",
                &["install", "-y", "ca-certificates-java"],
            )
            .await?;
        }

        self.install_keyring(ctx).await?;
        self.run_vendor_installer(ctx, &ctx.driver_url, &[]).await
    }

    async fn install_toolkit(&self, ctx: &ProvisioningContext) -> ProvisionResult<()> {
        info!(toolkit = %ctx.versions.toolkit, "Installing toolkit");
        self.run_vendor_installer(ctx, &ctx.toolkit_url, &["--toolkit", "--no-opengl-libs"])
            .await
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
        "debian"
    }
}
