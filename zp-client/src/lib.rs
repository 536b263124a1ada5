//! Client for one ZonePlayer: device description, service definitions and
//! event subscriptions.
//!
//! # Overview
//!
//! - [`ZpClient`]: fetches `/xml/device_description.xml` and SCPDs, and
//!   subscribes to every evented service once [`open`](ZpClient::open)ed.
//! - [`ZpListener`]: the callback server the device posts notifications to.
//!   It must be started before the client is opened.
//! - [`ClientMessage`]: what an open client sends its owner, either a decoded
//!   [`EventRecord`] or a non-fatal [`ZpError`].
//!
//! # Example
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use zp_client::{ClientMessage, ZpClient, ZpClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> zp_client::Result<()> {
//!     let mut client = ZpClient::new(ZpClientConfig::new("192.168.1.50"))?;
//!     let mut listener = client.listener();
//!
//!     let (errors_tx, _errors_rx) = mpsc::unbounded_channel();
//!     listener.start(errors_tx).await?;
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     client.open(&listener, tx).await?;
//!
//!     if let Some(ClientMessage::Event(event)) = rx.recv().await {
//!         println!("{} {} {}", event.device, event.service, event.payload);
//!     }
//!
//!     client.close().await?;
//!     listener.stop().await;
//!     Ok(())
//! }
//! ```

mod client;
mod description;
mod error;
mod event;
mod listener;
mod subscription;
pub mod xml;

pub use client::{ZpClient, ZpClientConfig, DEFAULT_PORT, DESCRIPTION_PATH};
pub use description::{Device, DeviceDescription, Service};
pub use error::{Result, ZpError};
pub use event::{decode_payload, ClientMessage, EventRecord};
pub use listener::ZpListener;

// Re-exported so callers can name the listener's error channel type.
pub use callback_server::CallbackError;
