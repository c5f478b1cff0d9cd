//! CPU compute backend using Rayon for shared-memory parallelism.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// CPU backend that parallelises work across threads via Rayon.
///
/// By default work runs on Rayon's global pool. [`CpuBackend::with_threads`]
/// builds a dedicated pool instead.
pub struct CpuBackend {
    pool: Option<ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend on the global thread pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Create a CPU backend with a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("pnr-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;
        log::debug!("built dedicated pool with {} threads", pool.current_num_threads());
        Ok(Self { pool: Some(pool) })
    }

    fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        let threads = self.num_threads();
        DeviceInfo {
            name: format!("CPU ({threads} threads)"),
            backend_type: BackendType::Cpu,
            compute_units: threads,
        }
    }

    fn map_indexed<T, F>(&self, len: usize, f: F) -> Result<Vec<T>, ComputeError>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        let run = || -> Vec<T> { (0..len).into_par_iter().map(&f).collect() };
        Ok(match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        })
    }
}
