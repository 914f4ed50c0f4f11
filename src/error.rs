//! Error types for the interception control library.

use crate::device::DeviceClass;
use thiserror::Error;

/// Result type alias for interceptor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the interception driver.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver binding could not be loaded, or refused to create a context.
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// The interceptor has not been initialized, or has been disposed.
    #[error("interceptor is not initialized")]
    NotInitialized,

    /// Operation on a destroyed context.
    #[error("invalid context handle")]
    InvalidHandle,

    /// Device id outside the 1..=20 slot range.
    #[error("invalid device: {0}")]
    InvalidDevice(i32),

    /// A stroke of the wrong kind was used with a device.
    #[error("device {device} expects {expected:?} strokes")]
    DeviceClassMismatch {
        /// Raw device id.
        device: i32,
        /// The class the device belongs to.
        expected: DeviceClass,
    },

    /// A wait elapsed without any device becoming ready.
    #[error("wait timed out")]
    Timeout,

    /// Fewer strokes than requested were transferred.
    #[error("partial transfer: {transferred} of {requested} strokes")]
    PartialTransfer {
        /// Number of strokes handed to the driver.
        requested: usize,
        /// Number of strokes the driver accepted.
        transferred: usize,
    },

    /// The installer could not be run or reported failure.
    #[error("installer failed: {0}")]
    InstallerFailed(String),

    /// The operation requires elevated permissions.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Platform-specific error.
    #[error("platform error: {0}")]
    Platform(String),

    /// Other errors.
    #[error("{0}")]
    Other(String),
}
