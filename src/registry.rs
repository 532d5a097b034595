use log::{info, warn};
use parking_lot::Mutex;

use crate::{
    config::{DeviceKind, NullConfig, RegistryConfig, StackConfig, TunConfig},
    device::{validate_name, DeviceInfo, DeviceState, NetDevice, NullDevice, TunDevice},
    error::{DeviceError, Result},
    frame::Frame,
    sink::FrameSink,
};

/// Outcome of one poll tick across every registered device
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct PollReport {
    /// Frames delivered by all devices
    pub delivered: usize,
    /// Devices whose poll failed, with the failure
    pub errors: Vec<(String, DeviceError)>,
}

impl PollReport {
    /// Returns `true` if no device failed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Inner {
    /// Live devices in registration order
    devices: Vec<Box<dyn NetDevice>>,
    /// Index of the device polled first in the next tick
    next: usize,
}

impl Inner {
    fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|dev| dev.name() == name)
    }

    fn device_mut(&mut self, name: &str) -> Result<&mut dyn NetDevice> {
        self.devices
            .iter_mut()
            .find(|dev| dev.name() == name)
            .map(|dev| &mut **dev as &mut dyn NetDevice)
            .ok_or_else(|| DeviceError::NotFound(name.to_owned()))
    }
}

/// Tracks the live devices by name and drives the poll loop.
///
/// The registry owns the uniqueness of device names. It is created at stack
/// start and must be drained at shutdown; devices it still holds when dropped
/// are destroyed with a warning.
pub struct Registry {
    /// Limits and budget
    config: RegistryConfig,
    /// Devices and the round-robin cursor
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Registry {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("devices", &self.names())
            .finish()
    }
}

impl Default for Registry {
    #[inline]
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    /// Creates an empty `Registry`
    #[inline]
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                devices: Vec::new(),
                next: 0,
            }),
        }
    }

    /// Creates a registry holding every device listed in `config`.
    ///
    /// # Errors
    /// Returns the first creation failure; devices created before it are
    /// destroyed.
    #[inline]
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        let registry = Self::new(config.registry);
        for spec in &config.devices {
            let created = match spec.kind {
                DeviceKind::Null(ref null) => registry.create_null(&spec.name, null),
                DeviceKind::Tun(ref tun) => registry.create_tun(&spec.name, tun),
            };
            if let Err(err) = created {
                let _n = registry.drain();
                return Err(err);
            }
        }
        Ok(registry)
    }

    /// Limits and budget of the registry
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Creates and registers a null device
    ///
    /// # Errors
    /// See [`Registry::create_with`].
    #[inline]
    pub fn create_null(&self, name: &str, config: &NullConfig) -> Result<()> {
        self.create_with(name, |name| NullDevice::create(name, config))
    }

    /// Creates and registers a tun device
    ///
    /// # Errors
    /// See [`Registry::create_with`]; also `HostDeviceUnavailable` if the host
    /// refuses the interface.
    #[inline]
    pub fn create_tun(&self, name: &str, config: &TunConfig) -> Result<()> {
        self.create_with(name, |name| TunDevice::create(name, config))
    }

    /// Creates a device with `factory` and registers it. The name is checked
    /// before the factory runs, so a conflicting name never touches the host.
    ///
    /// # Errors
    /// `InvalidName`, `NameConflict` if a live device uses the name,
    /// `ResourceExhausted` if the registry is full, or the factory's error.
    /// A device the factory builds under another name, or not active, is
    /// destroyed and refused with `NameConflict` or `Closed`.
    #[inline]
    pub fn create_with<D, F>(&self, name: &str, factory: F) -> Result<()>
    where
        D: NetDevice + 'static,
        F: FnOnce(&str) -> Result<D>,
    {
        validate_name(name)?;
        let mut inner = self.inner.lock();
        self.check_admission(&inner, name)?;
        let mut dev = factory(name)?;
        let built = if dev.name() != name {
            Err(DeviceError::NameConflict(dev.name().to_owned()))
        } else if dev.state() != DeviceState::Active {
            Err(DeviceError::Closed(dev.name().to_owned()))
        } else {
            Ok(())
        };
        if let Err(err) = built {
            warn!("factory for {name} built a rejected device: {err}");
            dev.destroy();
            return Err(err);
        }
        inner.devices.push(Box::new(dev));
        info!("registered device {name}");
        Ok(())
    }

    /// Registers an already created device.
    ///
    /// # Errors
    /// `NameConflict`, `ResourceExhausted`, or `Closed` if the device is not
    /// active. A rejected device is destroyed.
    #[inline]
    pub fn register(&self, mut dev: Box<dyn NetDevice>) -> Result<()> {
        let mut inner = self.inner.lock();
        let admitted = if dev.state() == DeviceState::Active {
            self.check_admission(&inner, dev.name())
        } else {
            Err(DeviceError::Closed(dev.name().to_owned()))
        };
        if let Err(err) = admitted {
            warn!("rejected device {}: {err}", dev.name());
            dev.destroy();
            return Err(err);
        }
        info!("registered device {}", dev.name());
        inner.devices.push(dev);
        Ok(())
    }

    fn check_admission(&self, inner: &Inner, name: &str) -> Result<()> {
        if inner.position(name).is_some() {
            return Err(DeviceError::NameConflict(name.to_owned()));
        }
        if inner.devices.len() >= self.config.max_devices {
            return Err(DeviceError::ResourceExhausted(format!(
                "registry holds {} devices",
                self.config.max_devices
            )));
        }
        Ok(())
    }

    /// Removes the device from the registry and hands it back undestroyed.
    /// The name becomes available immediately.
    #[inline]
    pub fn unregister(&self, name: &str) -> Option<Box<dyn NetDevice>> {
        let mut inner = self.inner.lock();
        let idx = inner.position(name)?;
        let dev = inner.devices.remove(idx);
        if inner.next > idx {
            inner.next -= 1;
        }
        info!("unregistered device {name}");
        Some(dev)
    }

    /// Unregisters and destroys the device, returns `false` if it was not registered
    #[inline]
    pub fn destroy(&self, name: &str) -> bool {
        self.unregister(name).map(|mut dev| dev.destroy()).is_some()
    }

    /// Describes the device registered under `name`
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<DeviceInfo> {
        let inner = self.inner.lock();
        let idx = inner.position(name)?;
        inner.devices.get(idx).map(|dev| DeviceInfo::of(&**dev))
    }

    /// Runs `f` on the device registered under `name`.
    ///
    /// `f` runs with the registry locked and must not call back into it.
    #[inline]
    pub fn with_device<R>(&self, name: &str, f: impl FnOnce(&mut dyn NetDevice) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.device_mut(name).ok().map(f)
    }

    /// Names of the registered devices, in registration order
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .devices
            .iter()
            .map(|dev| dev.name().to_owned())
            .collect()
    }

    /// Number of registered devices
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().devices.len()
    }

    /// Returns `true` if no device is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `frame` through the device registered under `name`
    ///
    /// # Errors
    /// `NotFound` for an unknown name, otherwise the device's send error.
    #[inline]
    pub fn send(&self, name: &str, frame: &[u8]) -> Result<usize> {
        self.inner.lock().device_mut(name)?.send(frame)
    }

    /// Polls a single device. The sink runs after the registry is unlocked
    /// and may call back into it.
    ///
    /// # Errors
    /// `NotFound` for an unknown name, otherwise the device's poll error.
    #[inline]
    pub fn poll(&self, name: &str, budget: usize, sink: &mut dyn FrameSink) -> Result<usize> {
        let mut frames = Vec::new();
        let polled = {
            let mut inner = self.inner.lock();
            let dev = inner.device_mut(name)?;
            poll_buffered(dev, budget, &mut frames)
        };
        for frame in frames {
            sink.deliver(name, frame);
        }
        polled
    }

    /// Polls every device once with at most `budget` frames each.
    ///
    /// The device polled first rotates every tick. Failures are collected in
    /// the report and never retried. Frames reach `sink` in poll order once
    /// the registry is unlocked, so the sink may send or look up devices.
    #[inline]
    pub fn poll_all(&self, budget: usize, sink: &mut dyn FrameSink) -> PollReport {
        let mut report = PollReport::default();
        let mut received: Vec<(String, Vec<Frame>)> = Vec::new();
        {
            let mut inner = self.inner.lock();
            let count = inner.devices.len();
            if count == 0 {
                return report;
            }
            let start = inner.next % count;
            for i in 0..count {
                let idx = (start + i) % count;
                let Some(dev) = inner.devices.get_mut(idx) else {
                    continue;
                };
                let mut frames = Vec::new();
                match poll_buffered(&mut **dev, budget, &mut frames) {
                    Ok(n) => report.delivered += n,
                    Err(err) => {
                        warn!("poll on {} failed: {err}", dev.name());
                        report.errors.push((dev.name().to_owned(), err));
                    }
                }
                if !frames.is_empty() {
                    received.push((dev.name().to_owned(), frames));
                }
            }
            inner.next = (start + 1) % count;
        }

        for (name, frames) in received {
            for frame in frames {
                sink.deliver(&name, frame);
            }
        }
        report
    }

    /// Polls every device with the configured budget
    #[inline]
    pub fn tick(&self, sink: &mut dyn FrameSink) -> PollReport {
        self.poll_all(self.config.poll_budget, sink)
    }

    /// Destroys and removes every device, returns how many were destroyed
    #[inline]
    pub fn drain(&self) -> usize {
        let devices = {
            let mut inner = self.inner.lock();
            inner.next = 0;
            std::mem::take(&mut inner.devices)
        };
        let count = devices.len();
        for mut dev in devices {
            dev.destroy();
        }
        if count > 0 {
            info!("drained {count} devices");
        }
        count
    }
}

/// Polls `dev` into `frames` so the caller's sink can run unlocked
fn poll_buffered(dev: &mut dyn NetDevice, budget: usize, frames: &mut Vec<Frame>) -> Result<usize> {
    let mut collect = |_: &str, frame: Frame| frames.push(frame);
    dev.poll(budget, &mut collect)
}

impl Drop for Registry {
    #[inline]
    fn drop(&mut self) {
        if !self.inner.get_mut().devices.is_empty() {
            warn!("registry dropped without drain");
            let _n = self.drain();
        }
    }
}
