use std::{io, thread, time::Duration};

use crate::{
    config::TunConfig,
    constants::MAX_DEVICE_NAME_LEN,
    device::{DeviceState, NetDevice},
    error::DeviceError,
    frame::{Frame, LinkMode},
    test_utils::{init_logger, MemoryTunnel, UdpLoopback},
};

use super::{PacketPrefix, TunDevice};

fn memory_dev(config: &TunConfig) -> (TunDevice<MemoryTunnel>, MemoryTunnel) {
    init_logger();
    let tunnel = MemoryTunnel::default();
    let dev = TunDevice::with_host("t0", config, tunnel.clone()).unwrap();
    (dev, tunnel)
}

fn collect(dev: &mut impl NetDevice, budget: usize) -> (usize, Vec<Frame>) {
    let mut frames = Vec::new();
    let n = dev
        .poll(budget, &mut |_: &str, frame: Frame| frames.push(frame))
        .unwrap();
    (n, frames)
}

#[test]
fn create_reports_l3_and_active() {
    let (dev, _tunnel) = memory_dev(&TunConfig::default());
    assert_eq!(dev.name(), "t0");
    assert_eq!(dev.link_mode(), LinkMode::RawL3);
    assert_eq!(dev.state(), DeviceState::Active);
    assert!(dev.is_link_up());
}

#[test]
fn destroy_twice_releases_handle_once() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    dev.destroy();
    dev.destroy();
    assert_eq!(dev.state(), DeviceState::Destroyed);
    assert!(!dev.is_link_up());
    drop(dev);
    assert_eq!(tunnel.0.lock().closes, 1);
}

#[test]
fn drop_releases_handle() {
    let (dev, tunnel) = memory_dev(&TunConfig::default());
    drop(dev);
    assert_eq!(tunnel.0.lock().closes, 1);
}

#[test]
fn oversized_send_never_reaches_host() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default().with_mtu(128));
    assert_eq!(dev.send(&[0x45; 128]).unwrap(), 128);
    assert!(matches!(
        dev.send(&[0x45; 129]),
        Err(DeviceError::MtuExceeded { len: 129, mtu: 128 })
    ));
    let shared = tunnel.0.lock();
    assert_eq!(shared.written.len(), 1);
    assert_eq!(shared.written[0].len(), 128);
}

#[test]
fn full_host_reports_would_block() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    tunnel.0.lock().full = true;
    assert!(matches!(dev.send(&[0x45; 20]), Err(DeviceError::WouldBlock)));
    assert_eq!(dev.stats().tx_errors, 0);
    assert_eq!(dev.stats().tx_frames, 0);

    tunnel.0.lock().full = false;
    assert_eq!(dev.send(&[0x45; 20]).unwrap(), 20);
    assert_eq!(dev.stats().tx_frames, 1);
    assert_eq!(dev.stats().tx_bytes, 20);
}

#[test]
fn poll_zero_budget_issues_no_read() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    tunnel.inject(&[0x45; 20]);
    assert_eq!(collect(&mut dev, 0).0, 0);
    assert_eq!(tunnel.0.lock().reads, 0);
    assert_eq!(tunnel.0.lock().queue.len(), 1);
}

#[test]
fn poll_is_bounded_by_budget() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    for i in 0..5u8 {
        tunnel.inject(&[0x45, i]);
    }

    let (n, frames) = collect(&mut dev, 3);
    assert_eq!(n, 3);
    assert_eq!(tunnel.0.lock().reads, 3);
    let seconds: Vec<u8> = frames.iter().map(|f| f[1]).collect();
    assert_eq!(seconds, vec![0, 1, 2]);

    let (n, frames) = collect(&mut dev, 10);
    assert_eq!(n, 2);
    assert_eq!(frames.len(), 2);
    // two frames plus the read that would block
    assert_eq!(tunnel.0.lock().reads, 6);

    assert_eq!(collect(&mut dev, 10).0, 0);
    assert_eq!(dev.stats().rx_frames, 5);
    assert_eq!(dev.stats().rx_bytes, 10);
}

#[test]
fn poll_stops_at_end_of_file() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    tunnel.inject(&[0x45; 8]);
    tunnel.0.lock().eof = true;

    let (n, _frames) = collect(&mut dev, 16);
    assert_eq!(n, 1);
    assert_eq!(tunnel.0.lock().reads, 2);
    assert!(!dev.is_link_up());
    assert_eq!(dev.state(), DeviceState::Active);
}

#[test]
fn read_error_is_reported_only_without_progress() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    tunnel.0.lock().read_error = Some(io::ErrorKind::BrokenPipe);
    let mut sink = |_: &str, _: Frame| {};
    assert!(matches!(dev.poll(4, &mut sink), Err(DeviceError::Io(_))));

    tunnel.inject(&[0x45; 8]);
    assert_eq!(collect(&mut dev, 4).0, 1);
}

#[test]
fn io_after_destroy_is_closed_and_untouched() {
    let (mut dev, tunnel) = memory_dev(&TunConfig::default());
    tunnel.inject(&[0x45; 8]);
    dev.destroy();

    let mut sink = |_: &str, _: Frame| unreachable!("destroyed device delivered a frame");
    assert!(matches!(dev.send(&[0x45; 8]), Err(DeviceError::Closed(_))));
    assert!(matches!(dev.poll(0, &mut sink), Err(DeviceError::Closed(_))));
    assert!(matches!(dev.poll(4, &mut sink), Err(DeviceError::Closed(_))));

    let shared = tunnel.0.lock();
    assert_eq!(shared.reads, 0);
    assert!(shared.written.is_empty());
}

#[test]
fn loopback_delivers_sent_frame() {
    init_logger();
    let mut dev = TunDevice::with_host("t0", &TunConfig::default(), MemoryTunnel::loopback()).unwrap();
    let datagram: Vec<u8> = (0..200u8).collect();
    assert_eq!(dev.send(&datagram).unwrap(), datagram.len());
    let (n, frames) = collect(&mut dev, 1);
    assert_eq!(n, 1);
    assert_eq!(frames[0].as_bytes(), datagram.as_slice());
}

#[test]
fn udp_loopback_delivers_sent_frame() {
    init_logger();
    let mut dev = TunDevice::with_host("t0", &TunConfig::default(), UdpLoopback::new()).unwrap();
    let mut datagram = vec![0x45u8; 64];
    datagram[63] = 0x7f;
    assert_eq!(dev.send(&datagram).unwrap(), 64);

    let mut received = None;
    for _ in 0..100 {
        let (_, mut frames) = collect(&mut dev, 4);
        if let Some(frame) = frames.pop() {
            received = Some(frame);
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(received.unwrap().as_bytes(), datagram.as_slice());
    dev.destroy();
}

#[test]
fn prefix_is_added_on_send_and_stripped_on_poll() {
    init_logger();
    let tunnel = MemoryTunnel::loopback();
    let config = TunConfig::default()
        .with_mtu(20)
        .with_prefix(PacketPrefix::PacketInfo);
    let mut dev = TunDevice::with_host("t0", &config, tunnel.clone()).unwrap();

    // the prefix does not count against the MTU
    let datagram = [0x45u8; 20];
    assert_eq!(dev.send(&datagram).unwrap(), 20);
    {
        let shared = tunnel.0.lock();
        assert_eq!(shared.written[0].len(), 24);
        assert_eq!(shared.written[0][..4], [0, 0, 0x08, 0x00]);
    }

    let (n, frames) = collect(&mut dev, 1);
    assert_eq!(n, 1);
    assert_eq!(frames[0].as_bytes(), &datagram);
    assert_eq!(dev.stats().rx_bytes, 20);
}

#[test]
fn runt_prefixed_datagram_is_skipped() {
    init_logger();
    let tunnel = MemoryTunnel::default();
    let config = TunConfig::default().with_prefix(PacketPrefix::AddressFamily);
    let mut dev = TunDevice::with_host("t0", &config, tunnel.clone()).unwrap();
    tunnel.inject(&[0, 0]);
    tunnel.inject(&[0, 0, 0, 2, 0x45]);

    let (n, frames) = collect(&mut dev, 4);
    assert_eq!(n, 1);
    assert_eq!(frames[0].as_bytes(), &[0x45]);
}

#[test]
fn host_create_rejects_bad_name_before_provisioning() {
    let name = "t".repeat(MAX_DEVICE_NAME_LEN + 1);
    assert!(matches!(
        TunDevice::create(&name, &TunConfig::default()),
        Err(DeviceError::InvalidName { .. })
    ));
}

#[test]
fn host_create_failure_is_host_unavailable() {
    init_logger();
    // an MTU the host cannot represent fails regardless of privileges
    let config = TunConfig::default().with_mtu(usize::from(u16::MAX) + 1);
    assert!(matches!(
        TunDevice::create("pndtest0", &config),
        Err(DeviceError::HostDeviceUnavailable { .. })
    ));
}
