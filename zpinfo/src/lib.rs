//! zpinfo: print a ZonePlayer's device description, or log its events.
//!
//! In query mode the description is fetched once, optionally enriched with
//! every service's control point definition, and printed as JSON. In
//! monitor mode (daemon or service) the tool subscribes to the device's
//! events and logs each one until SIGINT or SIGTERM.
//!
//! The [`Orchestrator`] drives both modes. It talks to the device through
//! the [`DeviceClient`] and [`EventListener`] traits; [`ZonePlayer`] and
//! [`ZoneListener`] implement them with `zp_client`.

pub mod config;
pub mod device;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod logging;
pub mod orchestrator;
pub mod shutdown;

pub use config::{Mode, MonitorConfig, Options};
pub use device::{DeviceClient, EventListener, Notice, NoticeSender, ZoneListener, ZonePlayer};
pub use error::{report, Error};
pub use format::JsonFormatter;
pub use orchestrator::{Orchestrator, State};
pub use shutdown::{OsSignals, ShutdownToken, ShutdownTrigger, Signal, SignalSource};

pub use zp_client::{Device, DeviceDescription, EventRecord, Service};
