//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution strategies so that
//! the reflectivity code in `pnr-core` stays agnostic of threading.

use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: usize,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Serial,
    Cpu,
}

/// Abstraction over compute backends.
///
/// The hot path of a reflectivity calculation is a map over Q points that
/// share no state, so the only primitive a backend has to provide is an
/// order-preserving indexed map.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Evaluate `f(0), f(1), ..., f(len - 1)` and collect the results in
    /// index order.
    ///
    /// # Arguments
    /// * `len` - Number of work items.
    /// * `f` - Pure function of the item index; may run on any thread.
    fn map_indexed<T, F>(&self, len: usize, f: F) -> Result<Vec<T>, ComputeError>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync;
}
