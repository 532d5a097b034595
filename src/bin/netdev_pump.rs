use std::{process, thread, time::Duration};

use log::{debug, error, info, warn};
use pseudo_netdev::{ConfigLoader, DeviceError, InboundQueue, Registry, StackConfig};

const USAGE: &str = "usage: netdev-pump [CONFIG] [--echo] [--ticks N] [--idle-ms MS]";
const DEFAULT_IDLE_MS: u64 = 10;

struct Args {
    config: Option<String>,
    echo: bool,
    ticks: Option<u64>,
    idle: Duration,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = Args {
            config: None,
            echo: false,
            ticks: None,
            idle: Duration::from_millis(DEFAULT_IDLE_MS),
        };
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--echo" => args.echo = true,
                "--ticks" => args.ticks = Some(Self::number(iter.next(), "--ticks")?),
                "--idle-ms" => {
                    args.idle = Duration::from_millis(Self::number(iter.next(), "--idle-ms")?);
                }
                "-h" | "--help" => return Err(USAGE.to_owned()),
                path if args.config.is_none() && !path.starts_with('-') => {
                    args.config = Some(path.to_owned());
                }
                other => return Err(format!("unexpected argument {other}\n{USAGE}")),
            }
        }
        Ok(args)
    }

    fn number(value: Option<String>, flag: &str) -> Result<u64, String> {
        value
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| format!("{flag} expects a number\n{USAGE}"))
    }
}

fn load_config(path: Option<&str>) -> Result<StackConfig, DeviceError> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load_default()?,
    };
    Ok(config)
}

/// Polls every device, logs inbound frames and optionally sends them back
fn run(registry: &Registry, args: &Args) {
    let mut queue = InboundQueue::new(registry.config().inbound_capacity.max(1));
    let mut tick = 0u64;
    while args.ticks.map_or(true, |limit| tick < limit) {
        tick = tick.wrapping_add(1);
        let report = registry.tick(&mut queue);
        for (name, err) in &report.errors {
            warn!("tick {tick}: {name}: {err}");
        }

        while let Some(inbound) = queue.pop() {
            info!("{} <- {} bytes", inbound.device, inbound.frame.len());
            if !args.echo {
                continue;
            }
            match registry.send(&inbound.device, &inbound.frame) {
                Ok(n) => debug!("{} -> {n} bytes", inbound.device),
                Err(DeviceError::WouldBlock) => debug!("{} busy, frame dropped", inbound.device),
                Err(err) => warn!("echo on {} failed: {err}", inbound.device),
            }
        }

        if report.delivered == 0 {
            thread::sleep(args.idle);
        }
    }
    if queue.dropped() > 0 {
        warn!("{} inbound frames dropped", queue.dropped());
    }
}

fn main() {
    env_logger::init();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(2);
        }
    };

    let registry = match load_config(args.config.as_deref()).and_then(|c| Registry::from_config(&c)) {
        Ok(registry) => registry,
        Err(err) => {
            error!("failed to start: {err}");
            process::exit(1);
        }
    };
    info!("pumping devices {:?}", registry.names());

    run(&registry, &args);

    let destroyed = registry.drain();
    info!("shutdown, {destroyed} devices destroyed");
}
