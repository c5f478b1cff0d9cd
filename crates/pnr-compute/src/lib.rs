//! # PNR Compute
//!
//! Compute backend abstraction for the PNR framework. This crate provides a
//! [`ComputeBackend`](backend::ComputeBackend) trait that isolates the
//! physics code from how independent work items are scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|-------|
//! | Serial | always | Single thread, deterministic order |
//! | CPU (Rayon) | `cpu` (default) | Global pool or a dedicated pool |

pub mod backend;
pub mod serial;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};
pub use serial::SerialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
