//! Accelerator topology and partition state
//!
//! A partitioned accelerator is one physical device split into isolated
//! hardware instances. Partition state changes which discovery mechanism
//! the scheduler uses and whether driver installation runs at all.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory holding the standard discovery binaries
pub const STANDARD_DISCOVERY_DIR: &str = "/usr/bin";

/// Partition mode reported for a single device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionMode {
    Enabled,
    Disabled,
    /// Anything the management tool reports that is not a known mode
    /// (e.g. "[N/A]" on hardware without partition support)
    Unknown,
}

impl PartitionMode {
    /// Parse one mode value as printed by the management tool
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Enabled" => PartitionMode::Enabled,
            "Disabled" => PartitionMode::Disabled,
            _ => PartitionMode::Unknown,
        }
    }
}

/// Parse per-device partition modes from csv,noheader query output
pub fn parse_partition_modes(output: &str) -> Vec<PartitionMode> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(PartitionMode::parse)
        .collect()
}

/// Whether the reported modes mean partitioning is active
///
/// True only when every visible device reports the same mode and that mode
/// is Enabled. Heterogeneous state and an empty device list both count as
/// not partitioned.
pub fn all_partitioned(modes: &[PartitionMode]) -> bool {
    let distinct: std::collections::HashSet<PartitionMode> = modes.iter().copied().collect();
    distinct.len() == 1 && distinct.contains(&PartitionMode::Enabled)
}

/// Parse a kernel device-registry document for a device class major number
///
/// The document is the character-device section of /proc/devices, lines of
/// the form "508 nvidia-caps".
pub fn parse_device_major(registry: &str, class: &str) -> Option<u32> {
    registry.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let major = parts.next()?.parse().ok()?;
        (parts.next()? == class).then_some(major)
    })
}

/// Accelerator layout for one node, computed once during setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorTopology {
    /// Whether the device is split into isolated partitions
    pub partitioned: bool,
    /// Number of partitions when partitioned, otherwise 0
    pub partition_count: u32,
    /// Major number of the partition capability device class
    pub device_major_capability: Option<u32>,
    /// Directory the scheduler's discovery executables live in
    pub discovery_tool_path: PathBuf,
}

impl AcceleratorTopology {
    /// Topology of a non-partitioned (or absent) accelerator
    pub fn standard() -> Self {
        Self {
            partitioned: false,
            partition_count: 0,
            device_major_capability: None,
            discovery_tool_path: PathBuf::from(STANDARD_DISCOVERY_DIR),
        }
    }

    /// Topology of a partitioned accelerator using a node-local bundle
    pub fn partitioned(partition_count: u32, major: Option<u32>, bundle_dir: PathBuf) -> Self {
        Self {
            partitioned: true,
            partition_count,
            device_major_capability: major,
            discovery_tool_path: bundle_dir,
        }
    }
}
