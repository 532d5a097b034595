#![allow(clippy::module_name_repetitions)] // exported

use std::{
    io,
    os::fd::{AsRawFd, RawFd},
};

use log::debug;
use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::config::TunConfig;

/// Non-blocking access to a host tunnel descriptor.
///
/// Every call returns immediately; `io::ErrorKind::WouldBlock` means no data
/// is available or the host buffer is full.
pub trait HostTunnel: Send {
    /// Reads one datagram into `buf`; `Ok(0)` means the host closed the interface
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes `buf` as one datagram
    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Releases the descriptor
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// A host TUN interface operating at L3
pub struct HostTun {
    /// Inner
    inner: tun::Device,
}

impl std::fmt::Debug for HostTun {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTun").finish()
    }
}

impl HostTun {
    /// Provisions (or attaches to) the interface `name` and switches its
    /// descriptor to non-blocking mode
    ///
    /// # Errors
    /// Returns an error if the host refuses the interface or the descriptor
    /// cannot be made non-blocking.
    #[allow(unused_results)] // ignore the config construction result
    #[inline]
    pub fn open(name: &str, config: &TunConfig) -> io::Result<Self> {
        let mtu = u16::try_from(config.mtu).map_err(|_err| {
            io::Error::new(io::ErrorKind::InvalidInput, "mtu does not fit the host limit")
        })?;

        let mut tun_config = tun::Configuration::default();
        tun_config.tun_name(name).layer(tun::Layer::L3).mtu(mtu);
        if let Some(network) = config.address {
            tun_config.address(network.ip()).netmask(network.mask());
        }
        if let Some(destination) = config.destination {
            tun_config.destination(destination);
        }
        if config.up {
            tun_config.up();
        } else {
            tun_config.down();
        }

        #[cfg(target_os = "linux")]
        if config.ensure_root {
            tun_config.platform_config(|platform| {
                platform.ensure_root_privileges(true);
            });
        }

        let inner = tun::create(&tun_config).map_err(io::Error::from)?;
        set_nonblocking(inner.as_raw_fd())?;
        debug!("host tun {name} opened, fd {}", inner.as_raw_fd());

        Ok(Self { inner })
    }
}

impl HostTunnel for HostTun {
    #[inline]
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf)
    }

    #[inline]
    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf)
    }

    #[inline]
    fn close(self) -> io::Result<()> {
        // the descriptor is closed when the device is dropped
        drop(self.inner);
        Ok(())
    }
}

/// Sets `O_NONBLOCK` on `fd`, keeping the other status flags
fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    let _prev = fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}
