//! gpuprov-core: Core types for the GPU node provisioning procedure
//!
//! This crate provides the fundamental types used throughout gpuprov:
//! - Operating system identity and dispatch
//! - Driver/toolkit version resolution
//! - Accelerator topology and partition state
//! - Provisioning context and configuration
//! - Error handling

pub mod config;
pub mod context;
pub mod error;
pub mod platform;
pub mod topology;
pub mod version;

pub use config::*;
pub use context::*;
pub use error::*;
pub use platform::*;
pub use topology::*;
pub use version::*;
