//! UPnP callback server for receiving ZonePlayer event notifications.
//!
//! This crate provides a lightweight HTTP server for handling UPnP `NOTIFY`
//! requests. It knows nothing about ZonePlayer services: it validates the
//! GENA headers, and hands the raw XML body to whoever registered the
//! request path.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds to the first free port in a range, advertises a
//!   base URL reachable from the target device, and serves `NOTIFY` requests
//!   until shut down.
//! - [`EventRouter`]: maps callback paths to channels. A subscriber registers
//!   its path *before* subscribing, so the initial event a device sends right
//!   after `SUBSCRIBE` is never lost.
//! - [`NotificationPayload`]: path, SID, sequence number and raw XML of one
//!   notification.
//!
//! Everything that goes wrong while serving (bad headers, unknown paths) is
//! answered with the proper HTTP status *and* reported on the error channel
//! passed to [`CallbackServer::new`], so the owner can log it.
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use callback_server::{CallbackConfig, CallbackServer, NotificationPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackError> {
//!     let (errors_tx, _errors_rx) = mpsc::unbounded_channel();
//!     let config = CallbackConfig::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)));
//!     let server = CallbackServer::new(config, errors_tx).await?;
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!     server.router().register("/notify/RINCON_1/AVTransport", tx).await;
//!     println!("callback: {}", server.callback_url("/notify/RINCON_1/AVTransport"));
//!
//!     while let Some(notification) = rx.recv().await {
//!         println!("{}: {}", notification.subscription_id, notification.event_xml);
//!     }
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
pub mod router;
mod server;

pub use error::CallbackError;
pub use router::{EventRouter, NotificationPayload};
pub use server::{CallbackConfig, CallbackServer};
