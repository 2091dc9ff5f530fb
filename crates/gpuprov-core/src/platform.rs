//! Operating system identity detection

use crate::{ProvisionError, ProvisionResult};
use serde::{Deserialize, Serialize};

/// Path consulted for OS identity
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Supported operating system families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Debian,
    Ubuntu,
    Rocky,
}

impl OsFamily {
    /// Whether this family uses the apt package manager
    pub fn is_apt(&self) -> bool {
        matches!(self, OsFamily::Debian | OsFamily::Ubuntu)
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::Ubuntu => write!(f, "ubuntu"),
            OsFamily::Rocky => write!(f, "rocky"),
        }
    }
}

/// Identity of the node's operating system
///
/// Detected once at startup; every subsequent branch in the procedure is
/// keyed off this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformIdentity {
    /// OS family
    pub family: OsFamily,
    /// Major release (e.g. "12" for Debian 12, "22" for Ubuntu 22.04)
    pub release: String,
}

impl PlatformIdentity {
    /// Detect the platform from the running system
    pub fn detect() -> ProvisionResult<Self> {
        let content = std::fs::read_to_string(OS_RELEASE_PATH)?;
        Self::parse_os_release(&content)
    }

    /// Parse an os-release document into a platform identity
    ///
    /// Fails closed: unknown families and releases are rejected before any
    /// installation step can run.
    pub fn parse_os_release(content: &str) -> ProvisionResult<Self> {
        let id = os_release_field(content, "ID")
            .ok_or_else(|| ProvisionError::UnsupportedPlatform("missing ID field".to_string()))?;
        let version_id = os_release_field(content, "VERSION_ID").ok_or_else(|| {
            ProvisionError::UnsupportedPlatform("missing VERSION_ID field".to_string())
        })?;

        let family = match id.as_str() {
            "debian" => OsFamily::Debian,
            "ubuntu" => OsFamily::Ubuntu,
            "rocky" => OsFamily::Rocky,
            other => {
                return Err(ProvisionError::UnsupportedPlatform(format!(
                    "unknown OS family '{}'",
                    other
                )))
            }
        };

        let release = version_id
            .split('.')
            .next()
            .unwrap_or(version_id.as_str())
            .to_string();

        let identity = Self { family, release };
        identity.validate()?;
        Ok(identity)
    }

    fn validate(&self) -> ProvisionResult<()> {
        let supported: &[&str] = match self.family {
            OsFamily::Debian => &["10", "11", "12"],
            OsFamily::Ubuntu => &["18", "20", "22"],
            OsFamily::Rocky => &["8", "9"],
        };
        if supported.contains(&self.release.as_str()) {
            Ok(())
        } else {
            Err(ProvisionError::UnsupportedPlatform(format!(
                "{} release {}",
                self.family, self.release
            )))
        }
    }
}

impl std::fmt::Display for PlatformIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.family, self.release)
    }
}

fn os_release_field(content: &str, field: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix('=')?;
        Some(rest.trim().trim_matches('"').to_string())
    })
}
