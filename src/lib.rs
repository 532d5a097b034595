//! Pseudo network devices for a user-space TCP/IP stack.
//!
//! A protocol stack talks to every device through [`NetDevice`]: `send` one
//! frame, `poll` with a budget to receive frames into a [`FrameSink`], and
//! `destroy` when done. Two variants are provided: [`NullDevice`], a discard
//! sink that never receives, and [`TunDevice`], which exchanges raw IP
//! datagrams with a host tunnel interface. The [`Registry`] keeps devices by
//! unique name and drives the cooperative poll loop.

#![deny(unsafe_code)]

/// Configuration types and loader
pub mod config;

/// Shared constants
pub mod constants;

/// Device interface and variants
pub mod device;

/// Error types
pub mod error;

/// Frame buffer
pub mod frame;

/// Device registry
pub mod registry;

/// Inbound frame path
pub mod sink;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigLoader, NullConfig, RegistryConfig, StackConfig, TunConfig};
pub use device::{
    DeviceInfo, DeviceState, DeviceStats, HostTun, HostTunnel, NetDevice, NullDevice,
    PacketPrefix, TunDevice,
};
pub use error::{DeviceError, Result};
pub use frame::{Frame, LinkMode};
pub use registry::{PollReport, Registry};
pub use sink::{FrameSink, InboundFrame, InboundQueue};
