//! ZonePlayer client: description, SCPDs and event subscriptions.

use callback_server::{EventRouter, NotificationPayload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::description::DeviceDescription;
use crate::error::{Result, ZpError};
use crate::event::{self, ClientMessage, EventRecord};
use crate::listener::ZpListener;
use crate::subscription::ServiceSubscription;
use crate::xml::{self, XmlOptions};

/// Port ZonePlayers serve UPnP on.
pub const DEFAULT_PORT: u16 = 1400;

/// Path of the device description document.
pub const DESCRIPTION_PATH: &str = "/xml/device_description.xml";

/// Configuration for a [`ZpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZpClientConfig {
    /// `host` or `host:port` of the ZonePlayer
    pub address: String,

    /// Bound on every HTTP request
    /// Default: 15 seconds
    pub timeout: Duration,

    /// Subscription duration requested from the device
    /// Default: 1800 seconds (30 minutes)
    pub subscription_timeout: Duration,

    /// Port range for the event listener
    /// Default: (3400, 3500)
    pub callback_ports: (u16, u16),
}

impl ZpClientConfig {
    /// Defaults for the device at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: Duration::from_secs(15),
            subscription_timeout: Duration::from_secs(1800),
            callback_ports: (3400, 3500),
        }
    }
}

/// Where notifications for one callback path come from.
#[derive(Debug, Clone)]
struct EventSource {
    device: String,
    service: String,
}

/// Subscriptions and tasks that exist while the client is open.
struct Session {
    subscriptions: Arc<Mutex<Vec<ServiceSubscription>>>,
    router: Arc<EventRouter>,
    paths: Vec<String>,
    tasks: Vec<JoinHandle<()>>,
}

/// Client for one ZonePlayer.
///
/// # Example
///
/// ```no_run
/// use zp_client::{ZpClient, ZpClientConfig};
///
/// # async fn run() -> zp_client::Result<()> {
/// let mut client = ZpClient::new(ZpClientConfig::new("192.168.1.50"))?;
/// let description = client.device_description().await?;
/// println!("{}", description.device.friendly_name);
/// # Ok(())
/// # }
/// ```
pub struct ZpClient {
    config: ZpClientConfig,
    base_url: Url,
    http: reqwest::Client,
    description: Option<DeviceDescription>,
    session: Option<Session>,
}

impl ZpClient {
    /// Create a client; no request is sent yet.
    ///
    /// # Errors
    ///
    /// `ZpError::InvalidAddress` if the address is not a `host[:port]`.
    pub fn new(config: ZpClientConfig) -> Result<Self> {
        let invalid = |reason: String| ZpError::InvalidAddress {
            address: config.address.clone(),
            reason,
        };

        let mut base_url = Url::parse(&format!("http://{}/", config.address))
            .map_err(|e| invalid(e.to_string()))?;
        if base_url.path() != "/" || base_url.host_str().is_none() {
            return Err(invalid("expected host or host:port".to_string()));
        }
        if base_url.port().is_none() {
            base_url
                .set_port(Some(DEFAULT_PORT))
                .map_err(|_| invalid("cannot set port".to_string()))?;
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            config,
            base_url,
            http,
            description: None,
            session: None,
        })
    }

    /// The address this client was configured with.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// `http://host:port/` of the device.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether subscriptions are open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// An idle listener suitable for [`open`](Self::open).
    pub fn listener(&self) -> ZpListener {
        let host = self.base_url.host_str().unwrap_or_default();
        let port = self.base_url.port_or_known_default().unwrap_or(DEFAULT_PORT);
        ZpListener::new(format!("{host}:{port}"), self.config.callback_ports)
    }

    /// Fetch and parse the device description.
    ///
    /// # Errors
    ///
    /// `Unreachable` on timeout or connection failure, `Http` on an error
    /// status, `Protocol` if the document is not a description.
    pub async fn device_description(&mut self) -> Result<DeviceDescription> {
        let url = self.resolve(DESCRIPTION_PATH)?;
        let xml = self.get(url).await?;
        let description = DeviceDescription::from_xml(&xml)?;
        debug!(
            address = %self.config.address,
            device = %description.device.friendly_name,
            "device description fetched"
        );
        self.description = Some(description.clone());
        Ok(description)
    }

    /// Fetch a service control point definition, `url` relative to the device.
    pub async fn service_definition(&self, url: &str) -> Result<Value> {
        let url = self.resolve(url)?;
        let xml = self.get(url).await?;
        xml::to_json(&xml, XmlOptions::description())
    }

    /// Subscribe to every evented service of the device.
    ///
    /// `listener` must be started. Events and non-fatal errors are sent on
    /// `messages` until [`close`](Self::close). If any subscription fails,
    /// those already made are cancelled before the error is returned.
    pub async fn open(
        &mut self,
        listener: &ZpListener,
        messages: mpsc::UnboundedSender<ClientMessage>,
    ) -> Result<()> {
        if self.session.is_some() {
            return Err(ZpError::AlreadyOpen);
        }
        let server = listener.server()?;
        let description = match &self.description {
            Some(description) => description.clone(),
            None => self.device_description().await?,
        };

        let router = server.router().clone();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let mut sources = HashMap::new();
        let mut paths = Vec::new();
        let mut subscriptions = Vec::new();

        for (device, service) in description.services() {
            let Some(event_sub_url) = &service.event_sub_url else {
                continue;
            };
            let path = format!("/notify/{}/{}", device.id(), service.name());
            router.register(&path, notify_tx.clone()).await;
            paths.push(path.clone());

            let subscribed = match self.resolve(event_sub_url) {
                Ok(endpoint) => {
                    ServiceSubscription::subscribe(
                        &self.http,
                        endpoint,
                        &server.callback_url(&path),
                        self.config.subscription_timeout,
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match subscribed {
                Ok(subscription) => {
                    subscriptions.push(subscription);
                    sources.insert(
                        path,
                        EventSource {
                            device: device.id().to_string(),
                            service: service.name().to_string(),
                        },
                    );
                }
                Err(e) => {
                    for subscription in &subscriptions {
                        if let Err(cleanup) = subscription.unsubscribe(&self.http).await {
                            debug!("cleanup after failed open: {cleanup}");
                        }
                    }
                    for path in &paths {
                        router.unregister(path).await;
                    }
                    return Err(e);
                }
            }
        }

        if subscriptions.is_empty() {
            return Err(ZpError::Protocol(format!(
                "{} has no evented services",
                self.config.address
            )));
        }
        info!(
            address = %self.config.address,
            count = subscriptions.len(),
            "subscribed to device events"
        );

        let subscriptions = Arc::new(Mutex::new(subscriptions));
        let tasks = vec![
            tokio::spawn(forward_events(notify_rx, sources, messages.clone())),
            tokio::spawn(renew_subscriptions(
                self.http.clone(),
                subscriptions.clone(),
                messages,
            )),
        ];

        self.session = Some(Session {
            subscriptions,
            router,
            paths,
            tasks,
        });
        Ok(())
    }

    /// Cancel every subscription. Closing a client that is not open does nothing.
    ///
    /// Every subscription is attempted even if one fails.
    ///
    /// # Errors
    ///
    /// The first `ZpError::Unsubscribe` encountered.
    pub async fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        for task in &session.tasks {
            task.abort();
        }

        let subscriptions = std::mem::take(&mut *session.subscriptions.lock().await);
        let mut first_error = None;
        for subscription in &subscriptions {
            if let Err(e) = subscription.unsubscribe(&self.http).await {
                warn!(sid = %subscription.sid(), "{e}");
                first_error.get_or_insert(e);
            }
        }

        for path in &session.paths {
            session.router.unregister(path).await;
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(address = %self.config.address, "all subscriptions cancelled");
                Ok(())
            }
        }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ZpError::Protocol(format!("invalid URL {path}: {e}")))
    }

    async fn get(&self, url: Url) -> Result<String> {
        let display = url.to_string();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ZpError::from_request(&display, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ZpError::Http {
                url: display,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ZpError::from_request(&display, e))
    }
}

/// Turn notifications into event records until the owner goes away.
async fn forward_events(
    mut notifications: mpsc::UnboundedReceiver<NotificationPayload>,
    sources: HashMap<String, EventSource>,
    messages: mpsc::UnboundedSender<ClientMessage>,
) {
    while let Some(notification) = notifications.recv().await {
        let path = notification.path.trim_end_matches('/');
        let message = match sources.get(path) {
            Some(source) => match event::decode_payload(&notification.event_xml) {
                Ok(payload) => ClientMessage::Event(EventRecord {
                    device: source.device.clone(),
                    service: source.service.clone(),
                    sequence: notification.sequence,
                    payload,
                }),
                Err(e) => ClientMessage::Error(e),
            },
            None => ClientMessage::Error(ZpError::Protocol(format!(
                "notification for unknown path {path}"
            ))),
        };

        if messages.send(message).is_err() {
            break;
        }
    }
}

/// Renew each subscription at half its granted duration.
async fn renew_subscriptions(
    http: reqwest::Client,
    subscriptions: Arc<Mutex<Vec<ServiceSubscription>>>,
    messages: mpsc::UnboundedSender<ClientMessage>,
) {
    loop {
        let next = subscriptions
            .lock()
            .await
            .iter()
            .map(ServiceSubscription::next_renewal)
            .min();
        let Some(next) = next else {
            return;
        };
        tokio::time::sleep_until(next).await;

        let now = tokio::time::Instant::now();
        let mut subscriptions = subscriptions.lock().await;
        for subscription in subscriptions.iter_mut().filter(|s| s.next_renewal() <= now) {
            if let Err(e) = subscription.renew(&http).await {
                warn!("{e}");
                if messages.send(ClientMessage::Error(e)).is_err() {
                    return;
                }
            }
        }
    }
}
