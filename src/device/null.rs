use log::info;

use crate::{
    config::NullConfig,
    error::Result,
    frame::LinkMode,
    sink::FrameSink,
};

use super::{check_mtu, DeviceState, DeviceStats, Lifecycle, NetDevice};

/// A device that discards every frame it is given and never receives one.
///
/// Useful as an always-ready sink and as a link-down stand-in in tests.
#[derive(Debug)]
pub struct NullDevice {
    /// Name and state
    lifecycle: Lifecycle,
    /// Largest accepted frame
    mtu: usize,
}

impl NullDevice {
    /// Creates an active `NullDevice`
    ///
    /// # Errors
    /// `InvalidName` if the name cannot be used as an interface name.
    #[inline]
    pub fn create(name: &str, config: &NullConfig) -> Result<Self> {
        let mut lifecycle = Lifecycle::new(name)?;
        lifecycle.activate();
        info!("null device {name} created, mtu {}", config.mtu);
        Ok(Self {
            lifecycle,
            mtu: config.mtu,
        })
    }
}

impl NetDevice for NullDevice {
    #[inline]
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    #[inline]
    fn mtu(&self) -> usize {
        self.mtu
    }

    #[inline]
    fn link_mode(&self) -> LinkMode {
        LinkMode::RawL2
    }

    #[inline]
    fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }

    #[inline]
    fn is_link_up(&self) -> bool {
        false
    }

    #[inline]
    fn stats(&self) -> DeviceStats {
        DeviceStats::default()
    }

    #[inline]
    fn send(&mut self, frame: &[u8]) -> Result<usize> {
        self.lifecycle.ensure_active()?;
        check_mtu(frame.len(), self.mtu)?;
        Ok(frame.len())
    }

    #[inline]
    fn poll(&mut self, _budget: usize, _sink: &mut dyn FrameSink) -> Result<usize> {
        self.lifecycle.ensure_active()?;
        Ok(0)
    }

    #[inline]
    fn destroy(&mut self) {
        let _first = self.lifecycle.retire();
    }
}
