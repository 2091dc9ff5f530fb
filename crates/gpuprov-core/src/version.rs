//! Driver and toolkit version resolution
//!
//! Resolution order: built-in defaults, then OS-specific exception
//! overrides, then operator-supplied overrides. Operator values always win.

use crate::{OsFamily, PlatformIdentity, ProvisionError, ProvisionResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default driver version installed when nothing overrides it
pub const DEFAULT_DRIVER_VERSION: &str = "535.104.05";
/// Default compute toolkit version
pub const DEFAULT_TOOLKIT_VERSION: &str = "12.2.2";
/// Default Spark acceleration plugin version
pub const DEFAULT_PLUGIN_VERSION: &str = "24.02.0";
/// Default ML library (XGBoost) version
pub const DEFAULT_ML_LIBRARY_VERSION: &str = "1.7.6";

/// Base URL for driver bundle downloads
pub const DRIVER_URL_BASE: &str = "https://download.nvidia.com/XFree86/Linux-x86_64";
/// Base URL for toolkit local installers
pub const TOOLKIT_URL_BASE: &str = "https://developer.download.nvidia.com/compute/cuda";

/// Only this compute-framework major version is supported
pub const SUPPORTED_FRAMEWORK_MAJOR: u32 = 3;

/// Operator-supplied version overrides, all optional
#[derive(Debug, Clone, Default)]
pub struct VersionOverrides {
    pub driver: Option<String>,
    pub toolkit: Option<String>,
    pub plugin: Option<String>,
    pub ml_library: Option<String>,
    pub driver_url: Option<String>,
    pub toolkit_url: Option<String>,
}

/// Fully-resolved versions for one node
///
/// Invariant: no field is ever empty after [`VersionSet::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSet {
    /// GPU driver version (e.g. "535.104.05")
    pub driver: String,
    /// Compute toolkit version (e.g. "12.2.2")
    pub toolkit: String,
    /// Spark acceleration plugin version
    pub plugin: String,
    /// ML library version
    pub ml_library: String,
}

impl VersionSet {
    /// Resolve the version set for a platform, honoring operator overrides
    pub fn resolve(platform: &PlatformIdentity, overrides: &VersionOverrides) -> Self {
        let mut driver = DEFAULT_DRIVER_VERSION.to_string();
        let mut toolkit = DEFAULT_TOOLKIT_VERSION.to_string();

        // Exception pins for releases the defaults do not support. Applied
        // before operator overrides so an explicit override still wins.
        match (platform.family, platform.release.as_str()) {
            (OsFamily::Ubuntu, "18") => {
                toolkit = "12.1.1".to_string();
                driver = "530.30.02".to_string();
            }
            (OsFamily::Debian, "12") => {
                toolkit = "12.3.2".to_string();
                driver = "545.23.08".to_string();
            }
            _ => {}
        }

        let toolkit = overrides.toolkit.clone().unwrap_or(toolkit);

        // Historical toolkit majors pair with a known driver; the lookup is
        // best-effort and a miss leaves the resolved driver untouched.
        if let Some(support) = legacy_lookup(major_of(&toolkit)) {
            driver = support.driver.to_string();
        }

        Self {
            driver: overrides.driver.clone().unwrap_or(driver),
            toolkit,
            plugin: overrides
                .plugin
                .clone()
                .unwrap_or_else(|| DEFAULT_PLUGIN_VERSION.to_string()),
            ml_library: overrides
                .ml_library
                .clone()
                .unwrap_or_else(|| DEFAULT_ML_LIBRARY_VERSION.to_string()),
        }
    }

    /// Toolkit version truncated at the last dot (e.g. "12.2")
    pub fn toolkit_major(&self) -> &str {
        major_of(&self.toolkit)
    }

    /// Toolkit major with dots replaced by dashes, as package names want it
    pub fn toolkit_major_dashed(&self) -> String {
        self.toolkit_major().replace('.', "-")
    }

    /// Driver major version (e.g. "535")
    pub fn driver_major(&self) -> &str {
        self.driver.split('.').next().unwrap_or(&self.driver)
    }

    /// Driver version truncated to major.minor (e.g. "535.104")
    pub fn driver_major_minor(&self) -> String {
        let mut parts = self.driver.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{}.{}", major, minor),
            _ => self.driver.clone(),
        }
    }

    /// Legacy support-library pairing for the active toolkit major, if any
    ///
    /// Best-effort: a miss means the already-resolved driver version stands.
    pub fn legacy_support(&self) -> Option<&'static LegacySupport> {
        legacy_lookup(self.toolkit_major())
    }

    /// Driver bundle URL carrying the full patch version
    pub fn primary_driver_url(&self) -> String {
        format!(
            "{}/{}/NVIDIA-Linux-x86_64-{}.run",
            DRIVER_URL_BASE, self.driver, self.driver
        )
    }

    /// Fallback driver bundle URL keyed by major.minor only
    pub fn fallback_driver_url(&self) -> String {
        let short = self.driver_major_minor();
        format!(
            "{}/{}/NVIDIA-Linux-x86_64-{}.run",
            DRIVER_URL_BASE, short, short
        )
    }

    /// Toolkit local-installer URL
    pub fn toolkit_url(&self) -> String {
        format!(
            "{}/{}/local_installers/cuda_{}_{}_linux.run",
            TOOLKIT_URL_BASE, self.toolkit, self.toolkit, self.driver
        )
    }
}

/// Historical driver and support-library pairing for one toolkit major
#[derive(Debug, Clone)]
pub struct LegacySupport {
    pub driver: &'static str,
    pub cudnn: &'static str,
    pub nccl: &'static str,
    pub toolkit_full: &'static str,
}

/// Driver/support-library table for historical toolkit majors (10.1-11.8)
static LEGACY_TOOLKIT_TABLE: &[(&str, LegacySupport)] = &[
    (
        "10.1",
        LegacySupport {
            driver: "418.87.00",
            cudnn: "7.6.5.32",
            nccl: "2.4.8",
            toolkit_full: "10.1.243",
        },
    ),
    (
        "10.2",
        LegacySupport {
            driver: "440.33.01",
            cudnn: "7.6.5.32",
            nccl: "2.5.6",
            toolkit_full: "10.2.89",
        },
    ),
    (
        "11.0",
        LegacySupport {
            driver: "450.51.06",
            cudnn: "8.0.4.30",
            nccl: "2.7.8",
            toolkit_full: "11.0.3",
        },
    ),
    (
        "11.1",
        LegacySupport {
            driver: "455.32.00",
            cudnn: "8.0.5.39",
            nccl: "2.8.3",
            toolkit_full: "11.1.1",
        },
    ),
    (
        "11.2",
        LegacySupport {
            driver: "460.32.03",
            cudnn: "8.1.1.33",
            nccl: "2.8.4",
            toolkit_full: "11.2.2",
        },
    ),
    (
        "11.3",
        LegacySupport {
            driver: "465.19.01",
            cudnn: "8.2.1.32",
            nccl: "2.9.9",
            toolkit_full: "11.3.1",
        },
    ),
    (
        "11.4",
        LegacySupport {
            driver: "470.82.01",
            cudnn: "8.2.4.15",
            nccl: "2.11.4",
            toolkit_full: "11.4.4",
        },
    ),
    (
        "11.5",
        LegacySupport {
            driver: "495.29.05",
            cudnn: "8.3.1.22",
            nccl: "2.11.4",
            toolkit_full: "11.5.2",
        },
    ),
    (
        "11.6",
        LegacySupport {
            driver: "510.47.03",
            cudnn: "8.4.0.27",
            nccl: "2.12.10",
            toolkit_full: "11.6.2",
        },
    ),
    (
        "11.7",
        LegacySupport {
            driver: "515.65.01",
            cudnn: "8.5.0.96",
            nccl: "2.12.12",
            toolkit_full: "11.7.1",
        },
    ),
    (
        "11.8",
        LegacySupport {
            driver: "520.61.05",
            cudnn: "8.6.0.163",
            nccl: "2.15.5",
            toolkit_full: "11.8.0",
        },
    ),
];

fn legacy_lookup(toolkit_major: &str) -> Option<&'static LegacySupport> {
    LEGACY_TOOLKIT_TABLE
        .iter()
        .find(|(major, _)| *major == toolkit_major)
        .map(|(_, support)| support)
}

/// Version string truncated at the last dot
fn major_of(version: &str) -> &str {
    match version.rfind('.') {
        Some(idx) => &version[..idx],
        None => version,
    }
}

/// Extract the framework version from submission-CLI output and check the
/// major version is supported
///
/// The CLI prints its banner to stderr, so callers pass stdout and stderr
/// concatenated.
pub fn ensure_supported_framework(cli_output: &str) -> ProvisionResult<String> {
    let re = Regex::new(r"version\s+(\d+)\.(\d+)\.(\d+)").expect("static regex");
    let caps = re.captures(cli_output).ok_or_else(|| {
        ProvisionError::Resolution("could not detect framework version".to_string())
    })?;

    let major: u32 = caps[1]
        .parse()
        .map_err(|_| ProvisionError::Resolution("bad framework major version".to_string()))?;
    if major != SUPPORTED_FRAMEWORK_MAJOR {
        return Err(ProvisionError::Resolution(format!(
            "framework version {}.{}.{} is not supported",
            &caps[1], &caps[2], &caps[3]
        )));
    }
    Ok(format!("{}.{}.{}", &caps[1], &caps[2], &caps[3]))
}
