/// Host tunnel descriptors
mod host;

/// Per-datagram host headers
mod prefix;

#[cfg(test)]
mod tests;

pub use host::{HostTun, HostTunnel};
pub use prefix::PacketPrefix;

use std::io;

use log::{debug, error, info, warn};

use crate::{
    config::TunConfig,
    error::{DeviceError, Result},
    frame::{Frame, LinkMode},
    sink::FrameSink,
};

use super::{check_mtu, validate_name, DeviceState, DeviceStats, Lifecycle, NetDevice};

/// A device that exchanges raw IP datagrams with a host tunnel interface
pub struct TunDevice<H: HostTunnel = HostTun> {
    /// Name and state
    lifecycle: Lifecycle,
    /// Largest datagram sent or received, excluding the prefix
    mtu: usize,
    /// Header carried by the host descriptor
    prefix: PacketPrefix,
    /// Backing descriptor, `None` once released
    host: Option<H>,
    /// Receive buffer, one datagram plus prefix
    rx_buf: Vec<u8>,
    /// Staging buffer for prefixed writes
    tx_buf: Vec<u8>,
    /// I/O counters
    stats: DeviceStats,
    /// The host reported end of file
    eof: bool,
}

impl<H: HostTunnel> std::fmt::Debug for TunDevice<H> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice")
            .field("name", &self.lifecycle.name())
            .field("state", &self.lifecycle.state())
            .field("mtu", &self.mtu)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl TunDevice<HostTun> {
    /// Provisions the host interface `name` and returns an active device
    ///
    /// # Errors
    /// `InvalidName` if the name cannot be used by the host,
    /// `HostDeviceUnavailable` if the host refuses the interface and
    /// `ResourceExhausted` if the frame buffers cannot be allocated.
    #[inline]
    pub fn create(name: &str, config: &TunConfig) -> Result<Self> {
        validate_name(name)?;
        let host = HostTun::open(name, config).map_err(|err| {
            warn!("failed to provision tun {name}: {err}");
            DeviceError::host_unavailable(name, err)
        })?;
        Self::with_host(name, config, host)
    }
}

impl<H: HostTunnel> TunDevice<H> {
    /// Builds an active device on top of an already opened host descriptor
    ///
    /// # Errors
    /// `InvalidName` for an unusable name and `ResourceExhausted` if the frame
    /// buffers cannot be allocated. The descriptor is released on failure.
    #[inline]
    pub fn with_host(name: &str, config: &TunConfig, host: H) -> Result<Self> {
        let mut lifecycle = Lifecycle::new(name)?;
        let prefix = config.prefix;
        let frame_cap = config
            .mtu
            .checked_add(prefix.len())
            .ok_or_else(|| DeviceError::ResourceExhausted(format!("mtu {}", config.mtu)))?;
        let rx_buf = alloc_buffer(frame_cap, frame_cap)?;
        let tx_buf = if prefix.is_empty() {
            Vec::new()
        } else {
            alloc_buffer(frame_cap, 0)?
        };
        lifecycle.activate();
        info!("tun device {name} created, mtu {}, prefix {prefix:?}", config.mtu);

        Ok(Self {
            lifecycle,
            mtu: config.mtu,
            prefix,
            host: Some(host),
            rx_buf,
            tx_buf,
            stats: DeviceStats::default(),
            eof: false,
        })
    }

    /// Writes `frame`, prefixed if the host expects it, in a single call
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let Some(host) = self.host.as_mut() else {
            return Err(DeviceError::Closed(self.lifecycle.name().to_owned()));
        };
        let buf = if self.prefix.is_empty() {
            frame
        } else {
            self.tx_buf.clear();
            self.prefix.encode_into(frame, &mut self.tx_buf);
            self.tx_buf.extend_from_slice(frame);
            &self.tx_buf
        };

        let n = host.write_nonblocking(buf)?;
        if n != buf.len() {
            return Err(DeviceError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {n} of {} bytes", buf.len()),
            )));
        }

        Ok(())
    }
}

impl<H: HostTunnel> NetDevice for TunDevice<H> {
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
        LinkMode::RawL3
    }

    #[inline]
    fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }

    #[inline]
    fn is_link_up(&self) -> bool {
        self.lifecycle.state() == DeviceState::Active && !self.eof
    }

    #[inline]
    fn stats(&self) -> DeviceStats {
        self.stats
    }

    #[inline]
    fn send(&mut self, frame: &[u8]) -> Result<usize> {
        self.lifecycle.ensure_active()?;
        check_mtu(frame.len(), self.mtu)?;
        match self.write_frame(frame) {
            Ok(()) => {
                self.stats.record_tx(frame.len());
                Ok(frame.len())
            }
            Err(DeviceError::WouldBlock) => Err(DeviceError::WouldBlock),
            Err(err) => {
                self.stats.record_tx_error();
                Err(err)
            }
        }
    }

    #[inline]
    fn poll(&mut self, budget: usize, sink: &mut dyn FrameSink) -> Result<usize> {
        self.lifecycle.ensure_active()?;
        if budget == 0 {
            return Ok(0);
        }
        let Some(host) = self.host.as_mut() else {
            return Err(DeviceError::Closed(self.lifecycle.name().to_owned()));
        };

        let mut delivered = 0;
        for _ in 0..budget {
            let n = match host.read_nonblocking(&mut self.rx_buf) {
                Ok(0) => {
                    debug!("tun {} reached end of file", self.lifecycle.name());
                    self.eof = true;
                    break;
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if delivered == 0 => return Err(DeviceError::Io(err)),
                Err(err) => {
                    // frames already handed to the stack stay delivered
                    warn!("tun {} read failed: {err}", self.lifecycle.name());
                    break;
                }
            };

            let Some(datagram) = self.rx_buf.get(..n).and_then(|buf| self.prefix.strip(buf))
            else {
                warn!("tun {} dropped a {n} byte runt", self.lifecycle.name());
                continue;
            };
            self.stats.record_rx(datagram.len());
            sink.deliver(self.lifecycle.name(), Frame::from(datagram));
            delivered += 1;
        }

        Ok(delivered)
    }

    #[inline]
    fn destroy(&mut self) {
        if !self.lifecycle.retire() {
            return;
        }
        if let Some(host) = self.host.take() {
            if let Err(err) = host.close() {
                error!("failed to release tun {}: {err}", self.lifecycle.name());
            }
        }
        info!("tun device {} released", self.lifecycle.name());
    }
}

impl<H: HostTunnel> Drop for TunDevice<H> {
    #[inline]
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Allocates a zeroed buffer of `len` bytes with room for `cap` bytes
fn alloc_buffer(cap: usize, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(cap)
        .map_err(|err| DeviceError::ResourceExhausted(format!("frame buffer: {err}")))?;
    buf.resize(len, 0);
    Ok(buf)
}
