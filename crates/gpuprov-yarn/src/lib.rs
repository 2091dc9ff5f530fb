//! gpuprov-yarn: Scheduler awareness and resource isolation
//!
//! Registers the accelerator as a typed scheduler resource on every node
//! and configures the per-node isolation plugin where a device (or the
//! primary role) warrants it.

pub mod configurator;
pub mod discovery;
pub mod properties;
pub mod services;

pub use configurator::*;
pub use discovery::*;
pub use properties::*;
pub use services::*;
