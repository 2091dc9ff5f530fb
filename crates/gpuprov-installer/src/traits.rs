//! Installer strategy trait

use async_trait::async_trait;
use gpuprov_core::{ProvisioningContext, ProvisionResult};

/// Per-OS-family installation strategy
///
/// Strategies are dispatched once per node from the detected platform and
/// must be idempotent: a re-run after an interrupted attempt may repeat
/// any step.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install the GPU driver for the running kernel
    async fn install_driver(&self, ctx: &ProvisioningContext) -> ProvisionResult<()>;

    /// Install the compute toolkit
    async fn install_toolkit(&self, ctx: &ProvisioningContext) -> ProvisionResult<()>;

    /// Register the recurring kernel-header sync unit
    async fn register_header_sync(&self, ctx: &ProvisioningContext) -> ProvisionResult<()>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}
