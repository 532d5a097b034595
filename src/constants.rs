/// Default MTU shared by every device type unless configured otherwise.
pub const DEFAULT_MTU: usize = 1500;

/// Maximum length of an interface name, excluding the trailing NUL the host adds.
pub const MAX_DEVICE_NAME_LEN: usize = libc::IFNAMSIZ - 1;

/// Length of the header some hosts put in front of every tunnel datagram.
pub(crate) const PACKET_PREFIX_LEN: usize = 4;

/// Default per-device frame budget for one poll tick.
pub(crate) const DEFAULT_POLL_BUDGET: usize = 64;
/// Default number of live devices a registry accepts.
pub(crate) const DEFAULT_MAX_DEVICES: usize = 32;
/// Default capacity of the inbound frame queue.
pub(crate) const DEFAULT_INBOUND_CAPACITY: usize = 1024;

pub(crate) const ETHERTYPE_IPV4: u16 = 0x0800;
pub(crate) const ETHERTYPE_IPV6: u16 = 0x86dd;
