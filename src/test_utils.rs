//! Loopback host tunnels and logging setup shared by the unit tests.

use std::{collections::VecDeque, io, net::UdpSocket, sync::Arc};

use parking_lot::Mutex;

use crate::device::HostTunnel;

/// Routes `log` output through the test harness
pub(crate) fn init_logger() {
    let _ignore = env_logger::builder().is_test(true).try_init();
}

/// Observable state of a `MemoryTunnel`
#[derive(Default)]
pub(crate) struct Shared {
    /// Datagrams waiting to be read
    pub(crate) queue: VecDeque<Vec<u8>>,
    /// Every buffer handed to `write_nonblocking`
    pub(crate) written: Vec<Vec<u8>>,
    pub(crate) reads: usize,
    pub(crate) closes: usize,
    /// Reject writes with `WouldBlock`
    pub(crate) full: bool,
    /// Report end of file once the queue is empty
    pub(crate) eof: bool,
    /// Fail the next read with this error kind
    pub(crate) read_error: Option<io::ErrorKind>,
    /// Written datagrams are queued for reading
    pub(crate) loopback: bool,
}

/// In-memory host tunnel, inspected through a shared handle
#[derive(Clone, Default)]
pub(crate) struct MemoryTunnel(pub(crate) Arc<Mutex<Shared>>);

impl MemoryTunnel {
    pub(crate) fn loopback() -> Self {
        let tunnel = Self::default();
        tunnel.0.lock().loopback = true;
        tunnel
    }

    pub(crate) fn inject(&self, datagram: &[u8]) {
        self.0.lock().queue.push_back(datagram.to_vec());
    }
}

impl HostTunnel for MemoryTunnel {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.0.lock();
        shared.reads += 1;
        if let Some(kind) = shared.read_error.take() {
            return Err(kind.into());
        }
        let Some(datagram) = shared.queue.pop_front() else {
            if shared.eof {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(n)
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.0.lock();
        if shared.full {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        shared.written.push(buf.to_vec());
        if shared.loopback {
            shared.queue.push_back(buf.to_vec());
        }
        Ok(buf.len())
    }

    fn close(self) -> io::Result<()> {
        self.0.lock().closes += 1;
        Ok(())
    }
}

/// A UDP socket connected to itself, so every datagram written comes back
pub(crate) struct UdpLoopback(UdpSocket);

impl UdpLoopback {
    pub(crate) fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(socket.local_addr().unwrap()).unwrap();
        socket.set_nonblocking(true).unwrap();
        Self(socket)
    }
}

impl HostTunnel for UdpLoopback {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf)
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn close(self) -> io::Result<()> {
        Ok(())
    }
}
