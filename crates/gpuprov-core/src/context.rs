//! Provisioning context threaded through every component

use crate::{
    AcceleratorTopology, PathsConfig, PlatformIdentity, ProvisionError, ProvisionResult,
    VersionSet,
};
use serde::{Deserialize, Serialize};

/// Role of this node within the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Cluster's designated primary node
    Primary,
    /// Regular worker node
    Worker,
}

impl NodeRole {
    /// Parse a role string; anything that is not the primary marker is a
    /// worker
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" | "master" => NodeRole::Primary,
            _ => NodeRole::Worker,
        }
    }
}

/// Accelerator runtime the cluster is provisioned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Spark,
}

impl RuntimeKind {
    /// Parse the operator-selected runtime kind; unsupported selectors are
    /// fatal
    pub fn parse(value: &str) -> ProvisionResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spark" => Ok(RuntimeKind::Spark),
            other => Err(ProvisionError::UnsupportedRuntime(other.to_string())),
        }
    }
}

/// Retry discipline for package-manager and network operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 5,
        }
    }
}

/// Everything resolved before installation begins
///
/// Immutable once constructed; components read from it instead of ambient
/// process state.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub platform: PlatformIdentity,
    pub versions: VersionSet,
    /// Resolved driver bundle URL (probe result or operator override)
    pub driver_url: String,
    /// Resolved toolkit installer URL
    pub toolkit_url: String,
    pub topology: AcceleratorTopology,
    pub role: NodeRole,
    pub runtime: RuntimeKind,
    /// Whether the GPU metrics agent should be installed
    pub install_agent: bool,
    pub retry: RetryPolicy,
    pub paths: PathsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_role_parse() {
        assert_eq!(NodeRole::parse("primary"), NodeRole::Primary);
        assert_eq!(NodeRole::parse("Master"), NodeRole::Primary);
        assert_eq!(NodeRole::parse("worker"), NodeRole::Worker);
        assert_eq!(NodeRole::parse(""), NodeRole::Worker);
    }

    #[test]
    fn test_runtime_kind_parse() {
        assert_eq!(RuntimeKind::parse("spark").unwrap(), RuntimeKind::Spark);
        assert_eq!(RuntimeKind::parse("SPARK").unwrap(), RuntimeKind::Spark);
        assert!(matches!(
            RuntimeKind::parse("dask").unwrap_err(),
            ProvisionError::UnsupportedRuntime(_)
        ));
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay_secs, 5);
    }
}
