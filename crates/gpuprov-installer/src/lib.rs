//! gpuprov-installer: GPU driver and toolkit installation
//!
//! One installation strategy per supported OS family. Every branch
//! converges on the same post-condition: driver and toolkit present and
//! the dynamic linker cache refreshed.

pub mod debian;
pub mod dispatch;
pub mod plugin;
pub mod rpm;
pub mod traits;
pub mod ubuntu;

pub use debian::*;
pub use dispatch::*;
pub use plugin::*;
pub use rpm::*;
pub use traits::*;
pub use ubuntu::*;
