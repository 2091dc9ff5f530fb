//! Scheduler resource registration and isolation configuration

use crate::properties::PropertyFile;
use gpuprov_core::{AcceleratorTopology, ProvisionResult};
use gpuprov_exec::CommandRunner;
use gpuprov_kernel::{register_unit, UnitSpec};
use std::path::{Path, PathBuf};
use tracing::info;

/// Scheduler resource type name for the accelerator
pub const GPU_RESOURCE_TYPE: &str = "yarn.io/gpu";
/// Cgroup filesystem root mounted for container isolation
pub const CGROUP_MOUNT_PATH: &str = "/sys/fs/cgroup";
/// Cgroup hierarchy the node manager confines containers under
pub const CGROUP_HIERARCHY: &str = "yarn";
/// Owning group of the container executor
pub const EXECUTOR_GROUP: &str = "yarn";
/// Unit reapplying device-control permissions after service restarts
pub const CGROUP_PERMISSION_UNIT: &str = "yarn-cgroup-device-perms.service";

const DOMINANT_RESOURCE_CALCULATOR: &str =
    "org.apache.hadoop.yarn.util.resource.DominantResourceCalculator";
const LINUX_CONTAINER_EXECUTOR: &str =
    "org.apache.hadoop.yarn.server.nodemanager.LinuxContainerExecutor";

/// Environment exports that make the scheduler treat each partition as a
/// device
const PARTITION_ENV_EXPORTS: [&str; 2] = [
    "export MIG_AS_GPU_ENABLED=1",
    "export ENABLE_MIG_GPUS_FOR_CGROUPS=1",
];

/// Writes the scheduler's GPU configuration
pub struct ResourceConfigurator {
    conf_dir: PathBuf,
}

impl ResourceConfigurator {
    pub fn new(conf_dir: impl Into<PathBuf>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
        }
    }

    fn file(&self, name: &str) -> PropertyFile {
        PropertyFile::new(self.conf_dir.join(name))
    }

    /// Cluster-wide resource-type registration, run on every node
    pub fn configure_cluster_wide(&self) -> ProvisionResult<()> {
        info!(conf_dir = %self.conf_dir.display(), "Registering GPU resource type");

        let resource_types = self.file("resource-types.xml");
        resource_types.ensure_exists()?;
        resource_types.set_property("yarn.resource-types", GPU_RESOURCE_TYPE)?;

        self.file("capacity-scheduler.xml").set_property(
            "yarn.scheduler.capacity.resource-calculator",
            DOMINANT_RESOURCE_CALCULATOR,
        )?;

        self.file("yarn-site.xml")
            .set_property("yarn.resource-types", GPU_RESOURCE_TYPE)?;
        Ok(())
    }

    /// Node-level isolation setup for nodes that schedule GPU work
    pub fn configure_isolation(&self, topology: &AcceleratorTopology) -> ProvisionResult<()> {
        info!(
            partitioned = topology.partitioned,
            discovery = %topology.discovery_tool_path.display(),
            "Configuring resource isolation"
        );

        let site = self.file("yarn-site.xml");
        site.set_property("yarn.nodemanager.resource-plugins", GPU_RESOURCE_TYPE)?;
        site.set_property(
            "yarn.nodemanager.resource-plugins.gpu.path-to-discovery-executables",
            &topology.discovery_tool_path.to_string_lossy(),
        )?;
        site.set_property(
            "yarn.nodemanager.linux-container-executor.cgroups.mount",
            "true",
        )?;
        site.set_property(
            "yarn.nodemanager.linux-container-executor.cgroups.mount-path",
            CGROUP_MOUNT_PATH,
        )?;
        site.set_property(
            "yarn.nodemanager.linux-container-executor.cgroups.hierarchy",
            CGROUP_HIERARCHY,
        )?;
        site.set_property(
            "yarn.nodemanager.container-executor.class",
            LINUX_CONTAINER_EXECUTOR,
        )?;
        site.set_property(
            "yarn.nodemanager.linux-container-executor.group",
            EXECUTOR_GROUP,
        )?;

        self.write_container_executor_cfg(topology)?;
        self.write_partition_exports(topology)?;
        Ok(())
    }

    /// Container executor configuration, written whole on every run
    fn write_container_executor_cfg(&self, topology: &AcceleratorTopology) -> ProvisionResult<()> {
        let mut cfg = format!(
            "yarn.nodemanager.linux-container-executor.group={}\n\n[gpu]\nmodule.enabled=true\n",
            EXECUTOR_GROUP
        );
        if topology.partitioned {
            if let Some(major) = topology.device_major_capability {
                cfg.push_str(&format!("gpu.major-device-number={}\n", major));
            }
        }
        cfg.push_str(&format!(
            "\n[cgroups]\nroot={}\nyarn-hierarchy={}\n",
            CGROUP_MOUNT_PATH, CGROUP_HIERARCHY
        ));

        std::fs::create_dir_all(&self.conf_dir)?;
        std::fs::write(self.conf_dir.join("container-executor.cfg"), cfg)?;
        Ok(())
    }

    /// Append the partition exports to the environment fragment, once each
    fn write_partition_exports(&self, topology: &AcceleratorTopology) -> ProvisionResult<()> {
        if !topology.partitioned {
            return Ok(());
        }
        let path = self.conf_dir.join("yarn-env.sh");
        let mut content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        for export in PARTITION_ENV_EXPORTS {
            if !content.lines().any(|line| line == export) {
                content.push_str(export);
                content.push('\n');
            }
        }
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Unit descriptor guarding cgroup device-control permissions
///
/// Service restarts reset the device-control directories to root-only;
/// this unit reopens them after every boot.
pub fn cgroup_permission_unit() -> UnitSpec {
    let mut spec = UnitSpec::boot_oneshot(
        CGROUP_PERMISSION_UNIT,
        "Reapply permissive modes on cgroup device controllers",
        &format!("/bin/bash -c 'chmod -R a+rwx {}/devices'", CGROUP_MOUNT_PATH),
    );
    spec.after = "hadoop-yarn-nodemanager.service".to_string();
    spec
}

/// Register the cgroup permission companion unit
pub async fn register_cgroup_permission_unit(
    runner: &dyn CommandRunner,
    unit_dir: &Path,
) -> ProvisionResult<()> {
    register_unit(runner, unit_dir, &cgroup_permission_unit()).await
}
