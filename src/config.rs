use std::{net::IpAddr, path::Path};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_INBOUND_CAPACITY, DEFAULT_MAX_DEVICES, DEFAULT_MTU, DEFAULT_POLL_BUDGET},
    device::tun::PacketPrefix,
};

const DEFAULT_CONFIG_PATH: &str = "/etc/pseudo-netdev/config.toml";

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration of a null device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct NullConfig {
    /// Largest frame the device accepts
    pub mtu: usize,
}

impl Default for NullConfig {
    #[inline]
    fn default() -> Self {
        Self { mtu: DEFAULT_MTU }
    }
}

/// Configuration of a tun device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct TunConfig {
    /// Largest IP datagram the device sends or receives
    pub mtu: usize,
    /// Address and netmask assigned to the host side of the interface
    pub address: Option<IpNetwork>,
    /// Point-to-point peer address
    pub destination: Option<IpAddr>,
    /// Bring the interface up after provisioning
    pub up: bool,
    /// Header the host descriptor puts in front of every datagram
    pub prefix: PacketPrefix,
    /// Fail provisioning early when not running with root privileges
    pub ensure_root: bool,
}

impl Default for TunConfig {
    #[inline]
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            address: None,
            destination: None,
            up: true,
            prefix: PacketPrefix::None,
            ensure_root: false,
        }
    }
}

impl TunConfig {
    /// Sets the MTU
    #[inline]
    #[must_use]
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Sets the host-side address
    #[inline]
    #[must_use]
    pub fn with_address(mut self, address: IpNetwork) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets the packet prefix carried by the host descriptor
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: PacketPrefix) -> Self {
        self.prefix = prefix;
        self
    }
}

/// Registry limits and the poll loop budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RegistryConfig {
    /// Frames a single device may deliver per tick
    pub poll_budget: usize,
    /// Number of devices that may be live at once
    pub max_devices: usize,
    /// Capacity of the inbound frame queue
    pub inbound_capacity: usize,
}

impl Default for RegistryConfig {
    #[inline]
    fn default() -> Self {
        Self {
            poll_budget: DEFAULT_POLL_BUDGET,
            max_devices: DEFAULT_MAX_DEVICES,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

/// Device variant and its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[non_exhaustive]
pub enum DeviceKind {
    /// Discard sink
    Null(NullConfig),
    /// Host tunnel
    Tun(TunConfig),
}

/// A device to create at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeviceSpec {
    /// Interface name
    pub name: String,
    /// Variant settings
    #[serde(flatten)]
    pub kind: DeviceKind,
}

/// Top level configuration file
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct StackConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Devices to create, in order
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceSpec>,
}

/// Reads `StackConfig` from TOML.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the configuration from the default path.
    #[inline]
    pub fn load_default() -> Result<StackConfig, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads the configuration from the specified path.
    #[inline]
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<StackConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses the configuration from a TOML string.
    #[inline]
    pub fn parse(content: &str) -> Result<StackConfig, ConfigError> {
        let config: StackConfig = toml::from_str(content)?;
        Ok(config)
    }
}
