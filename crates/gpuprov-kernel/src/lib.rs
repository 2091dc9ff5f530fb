//! gpuprov-kernel: Kernel maintenance for GPU nodes
//!
//! Two independent behaviors: a recurring boot-time unit that reconciles
//! installed kernel headers with the running kernel, and a pre-flight
//! kernel upgrade for RPM-family nodes that may reboot the node before the
//! rest of the procedure runs.

pub mod headers;
pub mod systemd;
pub mod upgrade;

pub use headers::*;
pub use systemd::*;
pub use upgrade::*;
