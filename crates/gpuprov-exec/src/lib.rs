//! gpuprov-exec: External-world access for the provisioning procedure
//!
//! Everything the procedure does to the node goes through the traits in
//! this crate: shell commands, bounded retries, artifact downloads, and
//! metadata lookups.

pub mod fetch;
pub mod metadata;
pub mod retry;
pub mod shell;
pub mod traits;

pub use fetch::*;
pub use metadata::*;
pub use retry::*;
pub use shell::*;
pub use traits::*;
