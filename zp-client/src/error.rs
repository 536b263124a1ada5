//! Error types for the ZonePlayer client.

use callback_server::CallbackError;

/// Errors raised while talking to a ZonePlayer.
#[derive(Debug, thiserror::Error)]
pub enum ZpError {
    /// The configured address cannot be turned into a device URL
    #[error("invalid device address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// No response before the timeout, or the connection failed
    #[error("{url}: no response: {reason}")]
    Unreachable { url: String, reason: String },

    /// The device answered with a non-success status
    #[error("{url}: HTTP status {status}")]
    Http { url: String, status: u16 },

    /// The device answered with something that is not what was asked for
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A SUBSCRIBE request was refused or failed
    #[error("subscribe to {url} failed: {reason}")]
    Subscribe { url: String, reason: String },

    /// A subscription renewal was refused or failed
    #[error("renewal of {url} failed: {reason}")]
    Renew { url: String, reason: String },

    /// An UNSUBSCRIBE request was refused or failed
    #[error("unsubscribe from {url} failed: {reason}")]
    Unsubscribe { url: String, reason: String },

    /// The event listener could not start or reported a problem
    #[error("listener: {0}")]
    Listener(#[from] CallbackError),

    /// The listener must be started before subscribing
    #[error("listener is not started")]
    NotListening,

    /// `open` was called on a client that already holds subscriptions
    #[error("client is already open")]
    AlreadyOpen,
}

impl ZpError {
    /// Whether the device did not answer at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ZpError::Unreachable { .. })
    }

    pub(crate) fn from_request(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            ZpError::Unreachable {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            ZpError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            ZpError::Protocol(format!("{url}: {error}"))
        }
    }
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ZpError>;
