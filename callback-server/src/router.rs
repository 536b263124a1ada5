//! Event routing for HTTP callback notifications.
//!
//! This module provides the `EventRouter` which maps callback paths to
//! subscriber channels and forwards incoming UPnP notifications.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::error::CallbackError;

/// Unparsed UPnP event notification received via HTTP callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// The request path the device posted to
    pub path: String,
    /// The subscription ID from the UPnP SID header
    pub subscription_id: String,
    /// The event sequence number from the SEQ header, when present
    pub sequence: Option<u32>,
    /// The raw XML event body
    pub event_xml: String,
}

/// Routes notifications from HTTP callbacks to subscriber channels.
///
/// Paths are compared without their trailing slash.
#[derive(Clone, Default)]
pub struct EventRouter {
    routes: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<NotificationPayload>>>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path`, replacing any previous subscriber for it.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::EventRouter;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let router = EventRouter::new();
    /// let (tx, _rx) = mpsc::unbounded_channel();
    /// router.register("/notify/RINCON_1/AVTransport", tx).await;
    /// assert!(router.is_registered("/notify/RINCON_1/AVTransport/").await);
    /// # }
    /// ```
    pub async fn register(
        &self,
        path: impl AsRef<str>,
        sender: mpsc::UnboundedSender<NotificationPayload>,
    ) {
        let mut routes = self.routes.write().await;
        routes.insert(normalize(path.as_ref()), sender);
    }

    /// Unregister `path`. Returns whether it was registered.
    pub async fn unregister(&self, path: &str) -> bool {
        let mut routes = self.routes.write().await;
        routes.remove(&normalize(path)).is_some()
    }

    /// Whether `path` currently has a subscriber.
    pub async fn is_registered(&self, path: &str) -> bool {
        self.routes.read().await.contains_key(&normalize(path))
    }

    /// Number of registered paths.
    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    /// Whether no path is registered.
    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    /// Forward a notification to the subscriber of its path.
    ///
    /// # Errors
    ///
    /// `UnknownPath` when nobody registered the path, `ReceiverClosed` when
    /// the subscriber dropped its receiver.
    pub async fn route_event(&self, payload: NotificationPayload) -> Result<(), CallbackError> {
        let key = normalize(&payload.path);
        let routes = self.routes.read().await;

        let sender = routes
            .get(&key)
            .ok_or_else(|| CallbackError::UnknownPath(key.clone()))?;

        sender
            .send(payload)
            .map_err(|_| CallbackError::ReceiverClosed(key))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
