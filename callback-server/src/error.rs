//! Error types for the callback server.

use std::net::IpAddr;

/// Errors raised while starting the server or serving a notification.
///
/// Serving errors are sent on the server's error channel rather than
/// returned, which is why the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    /// Every port of the configured range is taken
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    /// The HTTP server could not bind to the selected port
    #[error("cannot bind callback server to port {port}: {reason}")]
    Bind { port: u16, reason: String },

    /// No local interface routes to the target device
    #[error("cannot detect local address towards {0}")]
    LocalAddress(IpAddr),

    /// A request carried missing or unexpected GENA headers
    #[error("invalid UPnP headers on {path}: {reason}")]
    InvalidHeaders { path: String, reason: String },

    /// A notification arrived for a path nobody registered
    #[error("no subscription registered for {0}")]
    UnknownPath(String),

    /// The subscriber for a path dropped its receiver
    #[error("subscriber for {0} is gone")]
    ReceiverClosed(String),
}
