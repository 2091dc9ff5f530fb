//! Boot-time kernel header reconciliation
//!
//! The sync unit is best-effort: it retries a few times and then exits
//! zero no matter what, so a mirror outage never blocks boot.

use crate::systemd::{register_unit, UnitSpec};
use gpuprov_core::{OsFamily, ProvisionResult};
use gpuprov_exec::CommandRunner;
use std::path::Path;

/// Unit name for the recurring header sync
pub const HEADER_SYNC_UNIT: &str = "kernel-header-sync.service";

/// Package-manager flavor used by the header sync command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgFlavor {
    Apt,
    Dnf,
}

impl From<OsFamily> for PkgFlavor {
    fn from(family: OsFamily) -> Self {
        if family.is_apt() {
            PkgFlavor::Apt
        } else {
            PkgFlavor::Dnf
        }
    }
}

/// Shell command installing headers for the running kernel
///
/// Three attempts, five seconds apart, then exit zero regardless.
pub fn header_sync_command(flavor: PkgFlavor) -> String {
    let install = match flavor {
        PkgFlavor::Apt => "apt-get install -y linux-headers-$(uname -r)",
        PkgFlavor::Dnf => "dnf install -y kernel-devel-$(uname -r)",
    };
    format!(
        "/bin/bash -c 'for i in 1 2 3; do {} && break; sleep 5; done; exit 0'",
        install
    )
}

/// Unit descriptor for the recurring header sync
pub fn header_sync_unit(flavor: PkgFlavor) -> UnitSpec {
    UnitSpec::boot_oneshot(
        HEADER_SYNC_UNIT,
        "Install kernel headers matching the running kernel",
        &header_sync_command(flavor),
    )
}

/// Register the recurring header-sync unit for this node
pub async fn register_header_sync(
    runner: &dyn CommandRunner,
    unit_dir: &Path,
    family: OsFamily,
) -> ProvisionResult<()> {
    let spec = header_sync_unit(PkgFlavor::from(family));
    register_unit(runner, unit_dir, &spec).await
}
