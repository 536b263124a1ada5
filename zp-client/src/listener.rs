//! Event listener: the callback server a ZonePlayer posts notifications to.

use callback_server::{CallbackConfig, CallbackError, CallbackServer};
use tokio::sync::mpsc;

use crate::error::{Result, ZpError};

/// Listener for ZonePlayer event notifications.
///
/// Created idle; [`start`](Self::start) binds the callback server. The
/// target is resolved at start so that host names work too.
pub struct ZpListener {
    /// `host:port` of the device, used to pick the advertised interface
    target: String,
    port_range: (u16, u16),
    server: Option<CallbackServer>,
}

impl ZpListener {
    /// Listener for the device at `target` (`host:port`).
    pub fn new(target: impl Into<String>, port_range: (u16, u16)) -> Self {
        Self {
            target: target.into(),
            port_range,
            server: None,
        }
    }

    /// Start accepting notifications; returns the base URL.
    ///
    /// Problems with individual notifications are reported on `errors`.
    /// Starting an already started listener returns its URL again.
    ///
    /// # Errors
    ///
    /// `ZpError::InvalidAddress` if the target does not resolve,
    /// `ZpError::Listener` if the server cannot bind.
    pub async fn start(&mut self, errors: mpsc::UnboundedSender<CallbackError>) -> Result<String> {
        if let Some(server) = &self.server {
            return Ok(server.base_url().to_string());
        }

        let target = tokio::net::lookup_host(self.target.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ZpError::InvalidAddress {
                address: self.target.clone(),
                reason: "cannot resolve host".to_string(),
            })?;

        let config = CallbackConfig::new(target.ip())
            .with_port_range(self.port_range.0, self.port_range.1);
        let server = CallbackServer::new(config, errors).await?;
        let url = server.base_url().to_string();
        self.server = Some(server);
        Ok(url)
    }

    pub(crate) fn server(&self) -> Result<&CallbackServer> {
        self.server.as_ref().ok_or(ZpError::NotListening)
    }

    /// Stop the callback server. Stopping an idle listener does nothing.
    pub async fn stop(&mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().await;
        }
    }
}
