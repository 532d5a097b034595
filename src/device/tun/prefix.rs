use serde::{Deserialize, Serialize};

use crate::constants::{ETHERTYPE_IPV4, ETHERTYPE_IPV6, PACKET_PREFIX_LEN};

/// Header the host puts in front of every datagram on a tunnel descriptor.
///
/// Whether a host emits one depends on the platform and on how the
/// interface was opened, so it is configured rather than detected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum PacketPrefix {
    /// Bare IP datagrams
    #[default]
    None,
    /// Linux `tun_pi`: 16-bit flags followed by the big-endian EtherType
    PacketInfo,
    /// BSD/macOS style big-endian 32-bit address family
    AddressFamily,
}

impl PacketPrefix {
    /// Number of bytes the prefix occupies
    #[inline]
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            PacketPrefix::None => 0,
            PacketPrefix::PacketInfo | PacketPrefix::AddressFamily => PACKET_PREFIX_LEN,
        }
    }

    /// Returns `true` for `PacketPrefix::None`
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Appends the prefix describing `datagram` to `out`
    pub(crate) fn encode_into(self, datagram: &[u8], out: &mut Vec<u8>) {
        let version = datagram.first().map(|b| b >> 4);
        match self {
            PacketPrefix::None => {}
            PacketPrefix::PacketInfo => {
                let proto = match version {
                    Some(4) => ETHERTYPE_IPV4,
                    Some(6) => ETHERTYPE_IPV6,
                    _ => 0,
                };
                out.extend_from_slice(&[0, 0]);
                out.extend_from_slice(&proto.to_be_bytes());
            }
            PacketPrefix::AddressFamily => {
                let family = match version {
                    Some(4) => libc::AF_INET,
                    Some(6) => libc::AF_INET6,
                    _ => libc::AF_UNSPEC,
                };
                #[allow(clippy::as_conversions, clippy::cast_sign_loss)] // AF_* are small positive
                out.extend_from_slice(&(family as u32).to_be_bytes());
            }
        }
    }

    /// Returns the datagram following the prefix, `None` for a runt buffer
    pub(crate) fn strip(self, buf: &[u8]) -> Option<&[u8]> {
        buf.get(self.len()..)
    }
}
