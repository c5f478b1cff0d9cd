//! Single-threaded backend.

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// Runs every work item on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "serial".to_string(),
            backend_type: BackendType::Serial,
            compute_units: 1,
        }
    }

    fn map_indexed<T, F>(&self, len: usize, f: F) -> Result<Vec<T>, ComputeError>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        Ok((0..len).map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_preserves_order() {
        let out = SerialBackend.map_indexed(5, |i| i * i).unwrap();
        assert_eq!(out, vec![0, 1, 4, 9, 16]);
        assert_eq!(SerialBackend.device_info().compute_units, 1);
    }
}
