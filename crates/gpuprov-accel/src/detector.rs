//! Accelerator partition detection
//!
//! Two independent predicates: whether an accelerator is present at all,
//! and whether every visible device reports partition mode Enabled. Only
//! when both hold does the node switch to partition-aware discovery; a
//! partitioned image is assumed to already carry compatible drivers, so
//! driver installation is skipped entirely.

use gpuprov_core::{
    all_partitioned, parse_device_major, parse_partition_modes, AcceleratorTopology,
    ProvisionResult, RetryPolicy,
};
use gpuprov_exec::{fetch_with_retries, CommandRunner, Fetcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Accelerator management tool
pub const MANAGEMENT_TOOL: &str = "nvidia-smi";

/// Kernel device-registry pseudo-file listing device class majors
pub const DEVICE_REGISTRY_PATH: &str = "/proc/devices";

/// Device class of the partition capability devices
pub const CAPABILITY_DEVICE_CLASS: &str = "nvidia-caps";

/// Upstream source of the partition-aware discovery bundle
const BUNDLE_BASE_URL: &str =
    "https://raw.githubusercontent.com/NVIDIA/spark-rapids-examples/main/tools/gpu-discovery";

/// The two scripts making up the node-local discovery bundle
pub const BUNDLE_SCRIPTS: [&str; 2] = ["get-mig-resources.sh", "set-mig-permissions.sh"];

/// Detects whether the accelerator is split into hardware partitions
pub struct PartitionDetector {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
    bundle_dir: PathBuf,
    retry: RetryPolicy,
    device_registry: PathBuf,
}

impl PartitionDetector {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn Fetcher>,
        bundle_dir: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            fetcher,
            bundle_dir,
            retry,
            device_registry: PathBuf::from(DEVICE_REGISTRY_PATH),
        }
    }

    /// Override the device-registry location (tests)
    pub fn with_device_registry(mut self, path: PathBuf) -> Self {
        self.device_registry = path;
        self
    }

    /// Whether an accelerator is present: the management tool exists and
    /// lists at least one device
    pub async fn accelerator_present(&self) -> bool {
        match self.runner.run(MANAGEMENT_TOOL, &["--list-gpus"]).await {
            Ok(output) => output.success && output.stdout.lines().any(|l| !l.trim().is_empty()),
            Err(_) => false,
        }
    }

    /// Compute the node's accelerator topology
    pub async fn detect(&self) -> ProvisionResult<AcceleratorTopology> {
        if !self.accelerator_present().await {
            debug!("No accelerator detected");
            return Ok(AcceleratorTopology::standard());
        }

        let query = self
            .runner
            .run(
                MANAGEMENT_TOOL,
                &["--query-gpu=mig.mode.current", "--format=csv,noheader"],
            )
            .await?;
        if !query.success {
            debug!("Partition mode query failed, assuming standard topology");
            return Ok(AcceleratorTopology::standard());
        }

        let modes = parse_partition_modes(&query.stdout);
        if !all_partitioned(&modes) {
            debug!(?modes, "Partitioning not uniformly enabled");
            return Ok(AcceleratorTopology::standard());
        }

        let partition_count = self
            .partition_count()
            .await
            .unwrap_or(modes.len() as u32);
        let major = self.capability_major();
        self.fetch_bundle().await?;

        info!(
            partition_count,
            capability_major = ?major,
            bundle = %self.bundle_dir.display(),
            "Partitioned accelerator detected"
        );
        Ok(AcceleratorTopology::partitioned(
            partition_count,
            major,
            self.bundle_dir.clone(),
        ))
    }

    /// Number of partition instances the management tool lists
    async fn partition_count(&self) -> Option<u32> {
        let output = self.runner.run(MANAGEMENT_TOOL, &["-L"]).await.ok()?;
        if !output.success {
            return None;
        }
        let count = output
            .stdout
            .lines()
            .filter(|line| line.trim_start().starts_with("MIG"))
            .count() as u32;
        (count > 0).then_some(count)
    }

    fn capability_major(&self) -> Option<u32> {
        let registry = std::fs::read_to_string(&self.device_registry).ok()?;
        parse_device_major(&registry, CAPABILITY_DEVICE_CLASS)
    }

    /// Fetch the node-local discovery bundle
    async fn fetch_bundle(&self) -> ProvisionResult<()> {
        std::fs::create_dir_all(&self.bundle_dir)?;
        for script in BUNDLE_SCRIPTS {
            let url = format!("{}/{}", BUNDLE_BASE_URL, script);
            let dest = self.bundle_dir.join(script);
            fetch_with_retries(self.fetcher.as_ref(), &self.retry, &url, &dest).await?;

            #[cfg(unix)]
            if dest.exists() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpuprov_core::ProvisionError;
    use gpuprov_exec::CommandOutput;
    use std::path::Path;
    use std::sync::Mutex;

    /// Plays back canned management-tool output and records every call
    struct ScriptedRunner {
        /// None simulates a missing management tool
        list_gpus: Option<String>,
        modes: String,
        instances: String,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
            *self.calls.lock().unwrap() += 1;
            let Some(list_gpus) = &self.list_gpus else {
                return Err(ProvisionError::Command("no such tool".to_string()));
            };
            let stdout = match args.first().copied() {
                Some("--list-gpus") => list_gpus.clone(),
                Some("--query-gpu=mig.mode.current") => self.modes.clone(),
                Some("-L") => self.instances.clone(),
                _ => String::new(),
            };
            Ok(CommandOutput::ok(&stdout))
        }
    }

    struct RecordingFetcher {
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for RecordingFetcher {
        async fn fetch(&self, url: &str, _dest: &Path) -> ProvisionResult<()> {
            self.fetched.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn exists(&self, _url: &str) -> bool {
            true
        }
    }

    fn detector(
        runner: ScriptedRunner,
        bundle_dir: &Path,
        registry: &Path,
    ) -> (Arc<ScriptedRunner>, Arc<RecordingFetcher>, PartitionDetector) {
        let runner = Arc::new(runner);
        let fetcher = Arc::new(RecordingFetcher {
            fetched: Mutex::new(Vec::new()),
        });
        let detector = PartitionDetector::new(
            runner.clone(),
            fetcher.clone(),
            bundle_dir.to_path_buf(),
            RetryPolicy {
                max_attempts: 1,
                delay_secs: 0,
            },
        )
        .with_device_registry(registry.to_path_buf());
        (runner, fetcher, detector)
    }

    #[tokio::test]
    async fn test_uniform_enabled_is_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let registry = dir.path().join("devices");
        std::fs::write(&registry, "195 nvidia\n508 nvidia-caps\n").unwrap();
        let runner = ScriptedRunner {
            list_gpus: Some("GPU 0: NVIDIA A100 (UUID: GPU-1)\n".to_string()),
            modes: "Enabled\nEnabled\n".to_string(),
            instances: "GPU 0: NVIDIA A100\n  MIG 3g.20gb Device 0\n  MIG 3g.20gb Device 1\n"
                .to_string(),
            calls: Mutex::new(0),
        };
        let bundle_dir = dir.path().join("bundle");
        let (_, fetcher, detector) = detector(runner, &bundle_dir, &registry);

        let topology = detector.detect().await.unwrap();

        assert!(topology.partitioned);
        assert_eq!(topology.partition_count, 2);
        assert_eq!(topology.device_major_capability, Some(508));
        assert_eq!(topology.discovery_tool_path, bundle_dir);
        assert_eq!(fetcher.fetched.lock().unwrap().len(), BUNDLE_SCRIPTS.len());
    }

    #[tokio::test]
    async fn test_heterogeneous_modes_are_not_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            list_gpus: Some("GPU 0: NVIDIA A100 (UUID: GPU-1)\n".to_string()),
            modes: "Enabled\nDisabled\n".to_string(),
            instances: String::new(),
            calls: Mutex::new(0),
        };
        let (_, fetcher, detector) = detector(runner, dir.path(), Path::new("/nonexistent"));

        let topology = detector.detect().await.unwrap();

        assert!(!topology.partitioned);
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absent_accelerator_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            list_gpus: None,
            modes: String::new(),
            instances: String::new(),
            calls: Mutex::new(0),
        };
        let (runner, fetcher, detector) = detector(runner, dir.path(), Path::new("/nonexistent"));

        let topology = detector.detect().await.unwrap();

        assert!(!topology.partitioned);
        // Presence probe only; no mode query, no bundle fetch
        assert_eq!(*runner.calls.lock().unwrap(), 1);
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_device_list_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            list_gpus: Some(String::new()),
            modes: "Enabled\n".to_string(),
            instances: String::new(),
            calls: Mutex::new(0),
        };
        let (_, _, detector) = detector(runner, dir.path(), Path::new("/nonexistent"));

        assert!(!detector.accelerator_present().await);
        let topology = detector.detect().await.unwrap();
        assert!(!topology.partitioned);
    }
}
