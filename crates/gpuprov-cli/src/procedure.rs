//! End-to-end provisioning sequence
//!
//! Order matters: validation and version resolution run before anything
//! touches the node, the kernel pre-flight may end the run with a reboot,
//! and only then do installation and scheduler configuration happen.

use gpuprov_accel::{set_exclusive_mode, AgentInstaller, PartitionDetector};
use gpuprov_core::{
    ensure_supported_framework, NodeRole, PlatformIdentity, ProvisionConfig, ProvisionError,
    ProvisionResult, ProvisioningContext, RetryPolicy, RuntimeKind, VersionOverrides, VersionSet,
};
use gpuprov_exec::{CommandRunner, Fetcher, Metadata};
use gpuprov_installer::install_spark_plugin;
use gpuprov_kernel::KernelUpgrader;
use gpuprov_yarn::{
    register_cgroup_permission_unit, restart_scheduler_services, write_discovery_script,
    ResourceConfigurator,
};
use std::sync::Arc;
use tracing::{info, warn};

/// The whole node-provisioning procedure
pub struct Procedure {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
    metadata: Arc<dyn Metadata>,
    config: ProvisionConfig,
}

impl Procedure {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn Fetcher>,
        metadata: Arc<dyn Metadata>,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            runner,
            fetcher,
            metadata,
            config,
        }
    }

    /// Provision this node
    ///
    /// Returns the resolved context, or None when a kernel-upgrade reboot
    /// was issued and the run continues after the next boot.
    pub async fn run(
        &self,
        platform: PlatformIdentity,
    ) -> ProvisionResult<Option<ProvisioningContext>> {
        info!(platform = %platform, "Provisioning GPU support");

        self.check_secure_boot().await?;
        let runtime = RuntimeKind::parse(&self.metadata.get("runtime-kind", "spark").await)?;
        let framework = self.detect_framework_version().await?;
        info!(framework = %framework, "Detected compute framework");

        let overrides = self.load_overrides().await;
        let versions = VersionSet::resolve(&platform, &overrides);
        let driver_url = self.resolve_driver_url(&versions, &overrides).await;
        let toolkit_url = overrides
            .toolkit_url
            .clone()
            .unwrap_or_else(|| versions.toolkit_url());
        let retry = RetryPolicy::default();

        let upgrader = KernelUpgrader::new(self.runner.clone(), retry);
        if upgrader.preflight(&platform, &self.config.paths).await? {
            warn!("Kernel upgraded, node is rebooting; provisioning resumes on next boot");
            return Ok(None);
        }

        let detector = PartitionDetector::new(
            self.runner.clone(),
            self.fetcher.clone(),
            self.config.paths.bundle_dir.clone(),
            retry,
        );
        let device_present = detector.accelerator_present().await;
        let topology = detector.detect().await?;

        let ctx = ProvisioningContext {
            platform,
            versions,
            driver_url,
            toolkit_url,
            topology,
            role: NodeRole::parse(&self.metadata.get("node-role", "worker").await),
            runtime,
            install_agent: self.metadata.get_flag("install-gpu-agent", false).await,
            retry,
            paths: self.config.paths.clone(),
        };

        if ctx.topology.partitioned {
            info!("Partitioned accelerator carries its own drivers, skipping driver installation");
        } else {
            gpuprov_installer::install(&ctx, self.runner.clone(), self.fetcher.clone()).await?;
        }

        install_spark_plugin(
            self.fetcher.as_ref(),
            &ctx.retry,
            &ctx.versions,
            &ctx.paths.spark_jars_dir,
        )
        .await?;

        let configurator = ResourceConfigurator::new(&ctx.paths.hadoop_conf_dir);
        configurator.configure_cluster_wide()?;
        if device_present || ctx.role == NodeRole::Primary {
            configurator.configure_isolation(&ctx.topology)?;
            write_discovery_script(&ctx.paths.bundle_dir, &ctx.topology)?;
            register_cgroup_permission_unit(self.runner.as_ref(), &ctx.paths.systemd_unit_dir)
                .await?;
        }
        restart_scheduler_services(self.runner.as_ref()).await?;

        if device_present {
            set_exclusive_mode(self.runner.as_ref(), &ctx.topology).await?;
        }
        if ctx.install_agent {
            AgentInstaller::new(self.runner.clone(), self.fetcher.clone())
                .install(&ctx)
                .await?;
        }

        info!("GPU provisioning complete");
        Ok(Some(ctx))
    }

    /// Driver modules cannot be loaded with secure boot enabled
    async fn check_secure_boot(&self) -> ProvisionResult<()> {
        match self.runner.run("mokutil", &["--sb-state"]).await {
            Ok(output) if output.success && output.stdout.contains("SecureBoot enabled") => {
                Err(ProvisionError::UnsupportedPlatform(
                    "secure boot is enabled".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn detect_framework_version(&self) -> ProvisionResult<String> {
        let output = self.runner.run("spark-submit", &["--version"]).await?;
        // The version banner goes to stderr
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        ensure_supported_framework(&combined)
    }

    async fn load_overrides(&self) -> VersionOverrides {
        VersionOverrides {
            driver: self.metadata.get_optional("gpu-driver-version").await,
            toolkit: self.metadata.get_optional("cuda-version").await,
            plugin: self.metadata.get_optional("rapids-plugin-version").await,
            ml_library: self.metadata.get_optional("ml-library-version").await,
            driver_url: self.metadata.get_optional("gpu-driver-url").await,
            toolkit_url: self.metadata.get_optional("cuda-url").await,
        }
    }

    async fn resolve_driver_url(
        &self,
        versions: &VersionSet,
        overrides: &VersionOverrides,
    ) -> String {
        if let Some(url) = &overrides.driver_url {
            return url.clone();
        }
        let primary = versions.primary_driver_url();
        if self.fetcher.exists(&primary).await {
            primary
        } else {
            let fallback = versions.fallback_driver_url();
            warn!(url = %fallback, "Primary driver bundle missing, using major.minor bundle");
            fallback
        }
    }
}
