//! Configuration for the provisioning procedure

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, loadable from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Metadata service configuration
    pub metadata: MetadataConfig,
    /// Filesystem locations the procedure writes to
    pub paths: PathsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ProvisionConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::ProvisionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::ProvisionError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::ProvisionError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Metadata service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Base URL of the cluster metadata key/value service
    pub endpoint: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://169.254.169.254/computeMetadata/v1/instance/attributes".to_string(),
        }
    }
}

/// Filesystem locations the procedure writes to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Hadoop configuration directory
    pub hadoop_conf_dir: PathBuf,
    /// Spark jar directory for the acceleration plugin
    pub spark_jars_dir: PathBuf,
    /// Directory for node-local discovery and agent bundles
    pub bundle_dir: PathBuf,
    /// Directory systemd units are written to
    pub systemd_unit_dir: PathBuf,
    /// Scratch directory for downloaded installers
    pub download_dir: PathBuf,
    /// Initialization log archived before a kernel-upgrade reboot
    pub init_log: PathBuf,
    /// Startup scripts patched to exit early after a kernel-upgrade reboot
    pub startup_scripts: Vec<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            hadoop_conf_dir: PathBuf::from("/etc/hadoop/conf"),
            spark_jars_dir: PathBuf::from("/usr/lib/spark/jars"),
            bundle_dir: PathBuf::from("/usr/local/yarn-gpu"),
            systemd_unit_dir: PathBuf::from("/etc/systemd/system"),
            download_dir: PathBuf::from("/var/tmp/gpuprov"),
            init_log: PathBuf::from("/var/log/gpu-provision.log"),
            startup_scripts: vec![
                PathBuf::from("/usr/local/share/startup/startup-script.sh"),
                PathBuf::from("/usr/local/share/startup/post-startup-script.sh"),
            ],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
