//! Error types for the pseudo network devices.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur in device creation and I/O.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeviceError {
    /// A live device already uses the name
    #[error("Device name already in use: {0}")]
    NameConflict(String),

    /// The name is empty, too long for the host, or contains forbidden characters
    #[error("Invalid device name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Resource exhausted
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The host could not provision the backing interface
    #[error("Host device {name} unavailable: {source}")]
    HostDeviceUnavailable {
        /// Requested interface name
        name: String,
        /// Underlying provisioning failure
        #[source]
        source: io::Error,
    },

    /// Frame is larger than the device MTU
    #[error("Frame of {len} bytes exceeds MTU {mtu}")]
    MtuExceeded {
        /// Frame length
        len: usize,
        /// Device MTU
        mtu: usize,
    },

    /// The backend cannot accept or provide data right now
    #[error("Operation would block")]
    WouldBlock,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// The device is not active
    #[error("Device closed: {0}")]
    Closed(String),

    /// No device with the name is registered
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeviceError {
    /// Convert to an appropriate errno value for FFI
    #[inline]
    #[must_use]
    pub fn to_errno(&self) -> i32 {
        match *self {
            DeviceError::NameConflict(_) => libc::EEXIST,
            DeviceError::InvalidName { .. } | DeviceError::Config(_) => libc::EINVAL,
            DeviceError::ResourceExhausted(_) => libc::ENOMEM,
            DeviceError::HostDeviceUnavailable { .. } => libc::ENODEV,
            DeviceError::MtuExceeded { .. } => libc::EMSGSIZE,
            DeviceError::WouldBlock => libc::EAGAIN,
            DeviceError::Io(ref e) => e.raw_os_error().unwrap_or(libc::EIO),
            DeviceError::Closed(_) => libc::EBADF,
            DeviceError::NotFound(_) => libc::ENOENT,
        }
    }

    /// Returns `true` if the same call may succeed later without any change
    /// to the device.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(*self, DeviceError::WouldBlock)
    }

    pub(crate) fn host_unavailable(name: &str, source: io::Error) -> Self {
        DeviceError::HostDeviceUnavailable {
            name: name.to_owned(),
            source,
        }
    }
}

/// Would-block conditions are surfaced as their own variant
impl From<io::Error> for DeviceError {
    #[inline]
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::WouldBlock {
            DeviceError::WouldBlock
        } else {
            DeviceError::Io(err)
        }
    }
}
