//! gpuprov-accel: Accelerator presence, partition detection, and
//! node-level accelerator services

pub mod agent;
pub mod compute_mode;
pub mod detector;

pub use agent::*;
pub use compute_mode::*;
pub use detector::*;
