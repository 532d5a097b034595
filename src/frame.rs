use std::ops::Deref;

/// One unit of raw link-layer data crossing the device boundary.
///
/// The bytes are opaque to the device layer: a tun frame is a bare IP
/// datagram, a null frame is whatever the stack handed over.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Frame bytes
    data: Vec<u8>,
}

impl Frame {
    /// Creates a `Frame` that owns `data`
    #[inline]
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the frame bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the frame and returns the underlying buffer
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for Frame {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Frame {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Frame {
    #[inline]
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Frame {
    #[inline]
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl std::fmt::Debug for Frame {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.data.len()).finish()
    }
}

/// Whether frames carry a link-layer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LinkMode {
    /// Frames start with a link-layer (Ethernet) header
    RawL2,
    /// Frames are bare network-layer datagrams
    RawL3,
}
