//! Command line options and monitor tuning.

use clap::Parser;
use std::ffi::OsString;
use std::time::Duration;

use crate::error::Error;

/// Monitor variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Log events with timestamps
    Daemon,
    /// Log events without timestamps, for a supervisor that adds its own
    Service,
}

/// Raw command line, as clap sees it.
#[derive(Parser, Debug)]
#[command(name = "zpinfo", version)]
#[command(about = "Sonos ZonePlayer information")]
#[command(long_about = "Print the device description of a Sonos ZonePlayer as JSON.\n\
    When run as daemon or service, log Sonos ZonePlayer events as JSON.")]
struct Args {
    /// IP address of the ZonePlayer
    #[arg(value_name = "ip")]
    address: String,

    /// Wait for <timeout> seconds instead of default 15
    #[arg(
        short,
        long,
        value_name = "timeout",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    timeout: u64,

    /// Do not include spaces nor newlines in JSON output
    #[arg(short, long = "noWhiteSpace")]
    no_white_space: bool,

    /// Include service control point definitions in device description
    #[arg(short = 'S', long)]
    scdp: bool,

    /// Run as daemon. Log ZonePlayer events
    #[arg(short, long, overrides_with = "service")]
    daemon: bool,

    /// Run as service. Log ZonePlayer events, without timestamps
    #[arg(short, long, overrides_with = "daemon")]
    service: bool,
}

/// Parsed command line. Fixed once parsing completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Target device, `host` or `host:port`; checked by the client
    pub address: String,
    /// Request timeout in seconds, within 1..=60
    pub timeout: u64,
    /// Compact JSON output
    pub no_white_space: bool,
    /// Attach service control point definitions to the description
    pub scdp: bool,
    /// `None` for query mode
    pub mode: Option<Mode>,
}

impl Options {
    /// Parse the process arguments.
    pub fn try_parse() -> Result<Self, clap::Error> {
        Self::try_parse_from(std::env::args_os())
    }

    /// Parse `args`, the first item being the program name.
    ///
    /// Of `--daemon` and `--service` the last one given wins.
    ///
    /// # Errors
    ///
    /// A `clap::Error` for bad input, and for `--help` / `--version` (whose
    /// exit code is 0).
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(args)?;
        let mode = if args.daemon {
            Some(Mode::Daemon)
        } else if args.service {
            Some(Mode::Service)
        } else {
            None
        };

        Ok(Self {
            address: args.address,
            timeout: args.timeout,
            no_white_space: args.no_white_space,
            scdp: args.scdp,
            mode,
        })
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Monitor-mode tuning, read from the environment.
///
/// - `ZPINFO_CALLBACK_PORTS`: listener port range, `start-end` (default `3400-3500`)
/// - `ZPINFO_SUBSCRIPTION_TIMEOUT`: seconds requested per subscription (default 1800)
/// - `ZPINFO_CLOSE_TIMEOUT`: seconds to wait for close at shutdown (default: no limit)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub callback_ports: (u16, u16),
    pub subscription_timeout: Duration,
    pub close_timeout: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            callback_ports: (3400, 3500),
            subscription_timeout: Duration::from_secs(1800),
            close_timeout: None,
        }
    }
}

impl MonitorConfig {
    /// Read the `ZPINFO_*` variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; unset variables keep their default.
    ///
    /// # Errors
    ///
    /// `Error::Config` naming the variable when a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ZPINFO_CALLBACK_PORTS") {
            config.callback_ports = parse_port_range(&value)
                .ok_or_else(|| invalid("ZPINFO_CALLBACK_PORTS", &value, "expected start-end"))?;
        }
        if let Some(value) = lookup("ZPINFO_SUBSCRIPTION_TIMEOUT") {
            config.subscription_timeout = parse_seconds(&value)
                .ok_or_else(|| invalid("ZPINFO_SUBSCRIPTION_TIMEOUT", &value, "expected seconds"))?;
        }
        if let Some(value) = lookup("ZPINFO_CLOSE_TIMEOUT") {
            config.close_timeout = Some(
                parse_seconds(&value)
                    .ok_or_else(|| invalid("ZPINFO_CLOSE_TIMEOUT", &value, "expected seconds"))?,
            );
        }

        Ok(config)
    }
}

fn invalid(name: &str, value: &str, expected: &str) -> Error {
    Error::Config(format!("{name}={value:?}: {expected}"))
}

fn parse_port_range(value: &str) -> Option<(u16, u16)> {
    let (start, end) = value.trim().split_once('-')?;
    let start: u16 = start.trim().parse().ok()?;
    let end: u16 = end.trim().parse().ok()?;
    (start > 0 && start <= end).then_some((start, end))
}

fn parse_seconds(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(seconds) => Some(Duration::from_secs(seconds)),
    }
}
