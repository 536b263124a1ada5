//! Collaborator seams: the device client and its event listener.
//!
//! The orchestrator only sees these traits. [`ZonePlayer`] and
//! [`ZoneListener`] implement them on top of `zp_client`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zp_client::{
    CallbackError, ClientMessage, DeviceDescription, EventRecord, ZpClient, ZpClientConfig,
    ZpListener,
};

use crate::config::{MonitorConfig, Options};
use crate::error::Error;

/// Something the monitor loop has to log.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Event(EventRecord),
    ListenerError(String),
    ClientError(String),
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;

/// Receives event notifications from the device.
#[async_trait]
pub trait EventListener: Send {
    /// Start listening; returns the URL the device is told to post to.
    ///
    /// Errors after startup are sent on `notices` as `ListenerError`.
    async fn start(&mut self, notices: NoticeSender) -> Result<String, Error>;

    /// Stop listening. Stopping a stopped listener does nothing.
    async fn stop(&mut self);
}

/// Talks to one device.
#[async_trait]
pub trait DeviceClient: Send {
    type Listener: EventListener;

    fn address(&self) -> &str;

    /// One round trip for the device description.
    async fn device_description(&mut self) -> Result<DeviceDescription, Error>;

    /// One round trip for a service control point definition.
    async fn service_definition(&mut self, url: &str) -> Result<Value, Error>;

    /// A fresh, idle listener for this device.
    fn listener(&self) -> Self::Listener;

    /// Subscribe to the device's events through a started `listener`.
    ///
    /// Events and errors arrive on `notices` until [`close`](Self::close).
    async fn open(
        &mut self,
        listener: &mut Self::Listener,
        notices: NoticeSender,
    ) -> Result<(), Error>;

    /// Release the subscription.
    async fn close(&mut self) -> Result<(), Error>;
}

/// [`DeviceClient`] for a ZonePlayer.
pub struct ZonePlayer {
    client: ZpClient,
    forward: Option<JoinHandle<()>>,
}

impl ZonePlayer {
    /// Client for the address in `options`; nothing is sent yet.
    pub fn new(options: &Options, monitor: &MonitorConfig) -> Result<Self, Error> {
        let mut config = ZpClientConfig::new(options.address.as_str());
        config.timeout = options.timeout_duration();
        config.subscription_timeout = monitor.subscription_timeout;
        config.callback_ports = monitor.callback_ports;

        Ok(Self {
            client: ZpClient::new(config)?,
            forward: None,
        })
    }
}

#[async_trait]
impl DeviceClient for ZonePlayer {
    type Listener = ZoneListener;

    fn address(&self) -> &str {
        self.client.address()
    }

    async fn device_description(&mut self) -> Result<DeviceDescription, Error> {
        Ok(self.client.device_description().await?)
    }

    async fn service_definition(&mut self, url: &str) -> Result<Value, Error> {
        Ok(self.client.service_definition(url).await?)
    }

    fn listener(&self) -> ZoneListener {
        ZoneListener {
            inner: self.client.listener(),
            forward: None,
        }
    }

    async fn open(&mut self, listener: &mut ZoneListener, notices: NoticeSender) -> Result<(), Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.client.open(&listener.inner, tx).await?;

        self.forward = Some(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let notice = match message {
                    ClientMessage::Event(event) => Notice::Event(event),
                    ClientMessage::Error(e) => Notice::ClientError(e.to_string()),
                };
                if notices.send(notice).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error> {
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
        self.client.close().await.map_err(|e| Error::Close(e.to_string()))
    }
}

/// [`EventListener`] for a ZonePlayer.
pub struct ZoneListener {
    inner: ZpListener,
    forward: Option<JoinHandle<()>>,
}

#[async_trait]
impl EventListener for ZoneListener {
    async fn start(&mut self, notices: NoticeSender) -> Result<String, Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<CallbackError>();
        let url = self.inner.start(tx).await?;

        self.forward = Some(tokio::spawn(async move {
            while let Some(error) = rx.recv().await {
                if notices.send(Notice::ListenerError(error.to_string())).is_err() {
                    break;
                }
            }
        }));
        Ok(url)
    }

    async fn stop(&mut self) {
        self.inner.stop().await;
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
    }
}

/// Wait for `client.close()`, at most `limit` when one is set.
pub async fn close_within<C>(client: &mut C, limit: Option<Duration>) -> Result<(), Error>
where
    C: DeviceClient + ?Sized,
{
    let result = match limit {
        None => client.close().await,
        Some(limit) => tokio::time::timeout(limit, client.close())
            .await
            .unwrap_or_else(|_| {
                Err(Error::Close(format!(
                    "no response within {} seconds",
                    limit.as_secs()
                )))
            }),
    };

    result.map_err(|e| match e {
        Error::Close(_) => e,
        other => Error::Close(other.to_string()),
    })
}
