use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use log::trace;

use crate::frame::Frame;

/// Inbound path of the stack, fed by devices from within `poll`.
///
/// `deliver` must never block; a sink that cannot take more frames drops them.
pub trait FrameSink {
    /// Hands one received frame to the stack
    fn deliver(&mut self, device: &str, frame: Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(&str, Frame),
{
    #[inline]
    fn deliver(&mut self, device: &str, frame: Frame) {
        self(device, frame);
    }
}

/// A frame received by a device, tagged with the device name
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InboundFrame {
    /// Name of the receiving device
    pub device: String,
    /// Frame contents
    pub frame: Frame,
}

/// Bounded inbound queue between the devices and the stack
#[derive(Debug)]
pub struct InboundQueue {
    /// Pending frames
    inner: ArrayQueue<InboundFrame>,
    /// Frames dropped because the queue was full
    dropped: AtomicU64,
}

impl InboundQueue {
    /// Creates a new `InboundQueue` holding at most `capacity` frames
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[inline]
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
            dropped: AtomicU64::new(0),
        }
    }

    /// Takes the oldest pending frame
    #[inline]
    pub fn pop(&self) -> Option<InboundFrame> {
        self.inner.pop()
    }

    /// Number of pending frames
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no frame is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Maximum number of pending frames
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Number of frames dropped since creation
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pushes a frame, dropping it if the queue is full
    #[inline]
    pub fn push(&self, device: &str, frame: Frame) {
        let entry = InboundFrame {
            device: device.to_owned(),
            frame,
        };
        if let Err(entry) = self.inner.push(entry) {
            trace!(
                "inbound queue full, dropping {} bytes from {}",
                entry.frame.len(),
                entry.device
            );
            let _prev = self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl FrameSink for InboundQueue {
    #[inline]
    fn deliver(&mut self, device: &str, frame: Frame) {
        self.push(device, frame);
    }
}
