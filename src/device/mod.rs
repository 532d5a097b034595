#![allow(clippy::module_name_repetitions)] // exported

/// Discard sink device
pub mod null;

/// Host tunnel device
pub mod tun;

pub use null::NullDevice;
pub use tun::{HostTun, HostTunnel, PacketPrefix, TunDevice};

use log::debug;

use crate::{
    constants::MAX_DEVICE_NAME_LEN,
    error::{DeviceError, Result},
    frame::LinkMode,
    sink::FrameSink,
};

/// Lifecycle state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceState {
    /// Allocated, backend not yet initialized
    Created,
    /// Accepting send and poll calls
    Active,
    /// Resources released; every I/O call fails with `Closed`
    Destroyed,
}

/// I/O counters of a device
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct DeviceStats {
    /// Frames accepted by `send`
    pub tx_frames: u64,
    /// Bytes accepted by `send`
    pub tx_bytes: u64,
    /// Frames delivered by `poll`
    pub rx_frames: u64,
    /// Bytes delivered by `poll`
    pub rx_bytes: u64,
    /// Failed sends, excluding would-block and MTU rejections
    pub tx_errors: u64,
}

impl DeviceStats {
    pub(crate) fn record_tx(&mut self, len: usize) {
        self.tx_frames = self.tx_frames.wrapping_add(1);
        self.tx_bytes = self.tx_bytes.wrapping_add(len as u64);
    }

    pub(crate) fn record_rx(&mut self, len: usize) {
        self.rx_frames = self.rx_frames.wrapping_add(1);
        self.rx_bytes = self.rx_bytes.wrapping_add(len as u64);
    }

    pub(crate) fn record_tx_error(&mut self) {
        self.tx_errors = self.tx_errors.wrapping_add(1);
    }
}

/// Network device interface used by the stack.
///
/// Implementations never block: a backend that cannot make progress reports
/// `DeviceError::WouldBlock` from `send` or stops early in `poll`. The device
/// layer never retries; that policy belongs to the caller.
pub trait NetDevice: Send {
    /// Interface name, unique among live devices
    fn name(&self) -> &str;

    /// Largest frame the device accepts or delivers
    fn mtu(&self) -> usize;

    /// Framing of the bytes exchanged with the stack
    fn link_mode(&self) -> LinkMode;

    /// Current lifecycle state
    fn state(&self) -> DeviceState;

    /// Whether the link can currently carry traffic
    fn is_link_up(&self) -> bool;

    /// Snapshot of the I/O counters
    fn stats(&self) -> DeviceStats;

    /// Transmits one frame and returns the number of frame bytes written.
    ///
    /// # Errors
    /// `MtuExceeded` before any write if the frame is too large,
    /// `WouldBlock` if the backend is full, `Io` for transport failures and
    /// `Closed` if the device is not active.
    fn send(&mut self, frame: &[u8]) -> Result<usize>;

    /// Delivers up to `budget` received frames to `sink` and returns how many
    /// were delivered. A zero budget performs no I/O.
    ///
    /// # Errors
    /// `Closed` if the device is not active, `Io` if the backend failed before
    /// any frame was delivered.
    fn poll(&mut self, budget: usize, sink: &mut dyn FrameSink) -> Result<usize>;

    /// Releases every owned resource and moves to `Destroyed`. Calling it
    /// again is a no-op.
    fn destroy(&mut self);
}

/// Point-in-time description of a device, returned by registry lookups
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DeviceInfo {
    /// Interface name
    pub name: String,
    /// Device MTU
    pub mtu: usize,
    /// Frame framing
    pub link_mode: LinkMode,
    /// Lifecycle state
    pub state: DeviceState,
    /// Link status
    pub link_up: bool,
    /// I/O counters
    pub stats: DeviceStats,
}

impl DeviceInfo {
    /// Captures the current attributes of `dev`
    #[inline]
    #[must_use]
    pub fn of(dev: &dyn NetDevice) -> Self {
        Self {
            name: dev.name().to_owned(),
            mtu: dev.mtu(),
            link_mode: dev.link_mode(),
            state: dev.state(),
            link_up: dev.is_link_up(),
            stats: dev.stats(),
        }
    }
}

/// Tracks the name and state transitions shared by every device variant
#[derive(Debug)]
pub(crate) struct Lifecycle {
    /// Interface name
    name: String,
    /// Current state
    state: DeviceState,
}

impl Lifecycle {
    /// Creates a new `Lifecycle` in the `Created` state
    pub(crate) fn new(name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_owned(),
            state: DeviceState::Created,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> DeviceState {
        self.state
    }

    /// Moves `Created` to `Active`; any other state is left untouched
    pub(crate) fn activate(&mut self) {
        if self.state == DeviceState::Created {
            self.state = DeviceState::Active;
            debug!("device {} active", self.name);
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.state == DeviceState::Active {
            Ok(())
        } else {
            Err(DeviceError::Closed(self.name.clone()))
        }
    }

    /// Moves to `Destroyed`, returns `false` if the device was already destroyed
    pub(crate) fn retire(&mut self) -> bool {
        if self.state == DeviceState::Destroyed {
            return false;
        }
        self.state = DeviceState::Destroyed;
        debug!("device {} destroyed", self.name);
        true
    }
}

/// Checks that `name` can be used as a host interface name.
///
/// # Errors
/// `InvalidName` if the name is empty, longer than the platform limit, or
/// contains NUL, `/` or whitespace.
#[inline]
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.len() > MAX_DEVICE_NAME_LEN {
        "name exceeds the interface name limit"
    } else if name
        .chars()
        .any(|c| c == '\0' || c == '/' || c.is_whitespace())
    {
        "name contains a forbidden character"
    } else {
        return Ok(());
    };

    Err(DeviceError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

pub(crate) fn check_mtu(len: usize, mtu: usize) -> Result<()> {
    if len > mtu {
        return Err(DeviceError::MtuExceeded { len, mtu });
    }
    Ok(())
}
