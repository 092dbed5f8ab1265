//! Error types for the raystream core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for device, pipeline and scene operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No compute adapter matched the requested options
    #[error("No compatible GPU adapter found: {0}")]
    NoAdapter(String),

    /// Logical device creation failed
    #[error("Failed to create device: {0}")]
    DeviceRequest(String),

    /// Validation or out-of-memory error raised by the device
    #[error("Device error: {0}")]
    Device(String),

    /// Waiting on the queue failed
    #[error("Device poll failed: {0}")]
    Poll(String),

    /// Mapping a staging buffer for readback failed
    #[error("Buffer map failed: {0}")]
    Map(String),

    /// Store or load outside the buffer's fixed size
    #[error("Transfer out of range for buffer '{buffer}': offset {offset} + {len} > {size}")]
    OutOfRange {
        buffer: &'static str,
        offset: u64,
        len: u64,
        size: u64,
    },

    /// Offset or length not a multiple of the copy alignment
    #[error("Misaligned transfer for buffer '{buffer}': offset {offset}, len {len} (alignment {align})")]
    Misaligned {
        buffer: &'static str,
        offset: u64,
        len: u64,
        align: u64,
    },

    /// Kernel invoked with arguments that do not match its signature
    #[error("Kernel '{kernel}' argument {position}: {reason}")]
    ArgumentMismatch {
        kernel: &'static str,
        position: usize,
        reason: String,
    },

    /// Unknown kernel name in a lookup
    #[error("Unknown kernel: {0}")]
    UnknownKernel(String),

    /// A fixed-size buffer does not fit the device limits
    #[error("Buffer '{buffer}' needs {size} bytes, device limit is {limit}")]
    CapacityExceeded {
        buffer: &'static str,
        size: u64,
        limit: u64,
    },

    /// Render resolution unusable (zero or overflowing)
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// Malformed geometry passed to a load operation
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Record bytes that do not decode to a valid record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Settings file not found
    #[error("Settings file not found: {0}")]
    SettingsNotFound(PathBuf),

    /// Settings JSON could not be parsed or written
    #[error("Settings format error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a device error from any wgpu error value.
    pub fn device(err: impl std::fmt::Display) -> Self {
        Self::Device(err.to_string())
    }

    /// Create an invalid geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an invalid record error.
    pub fn record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}

/// Result type alias for raystream operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::OutOfRange {
            buffer: "ray_data",
            offset: 64,
            len: 16,
            size: 72,
        };
        let msg = e.to_string();
        assert!(msg.contains("ray_data"));
        assert!(msg.contains("72"));

        let e = Error::InvalidResolution { width: 0, height: 600 };
        assert!(e.to_string().contains("0x600"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
