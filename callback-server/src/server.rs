//! HTTP server for receiving UPnP event notifications.

use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use warp::http::{Method, StatusCode};
use warp::Filter;

use crate::error::CallbackError;
use crate::router::{EventRouter, NotificationPayload};

/// Port ZonePlayers listen on; used only to pick the outbound interface.
const DEVICE_PORT: u16 = 1400;

/// Settings for a [`CallbackServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackConfig {
    /// Range of ports to try binding to (inclusive)
    /// Default: (3400, 3500)
    pub port_range: (u16, u16),

    /// Address of the device that will send notifications. The advertised
    /// base URL uses the local address that routes to it.
    pub target: IpAddr,
}

impl CallbackConfig {
    /// Default port range towards `target`.
    pub fn new(target: IpAddr) -> Self {
        Self {
            port_range: (3400, 3500),
            target,
        }
    }

    /// Override the port range.
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = (start, end);
        self
    }
}

/// HTTP callback server for receiving UPnP event notifications.
///
/// The server accepts `NOTIFY` requests on any path, validates the GENA
/// headers, and routes the body through its [`EventRouter`].
pub struct CallbackServer {
    /// The port the server is bound to
    port: u16,
    /// The base URL for callback registration
    base_url: String,
    /// Routes notifications to subscribers
    event_router: Arc<EventRouter>,
    /// Shutdown signal sender
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind and start the server.
    ///
    /// The server is accepting connections when this returns. Problems with
    /// individual requests are reported on `errors`.
    ///
    /// # Errors
    ///
    /// `NoAvailablePort` when the whole range is taken, `Bind` when the
    /// selected port is grabbed in between, `LocalAddress` when no local
    /// interface routes to the target.
    pub async fn new(
        config: CallbackConfig,
        errors: mpsc::UnboundedSender<CallbackError>,
    ) -> Result<Self, CallbackError> {
        let (start, end) = config.port_range;
        let port = Self::find_available_port(start, end)
            .ok_or(CallbackError::NoAvailablePort { start, end })?;

        let local_ip = Self::detect_local_ip(config.target)
            .ok_or(CallbackError::LocalAddress(config.target))?;

        let event_router = Arc::new(EventRouter::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let routes = notify_route(event_router.clone(), errors).recover(handle_rejection);

        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    let _ = shutdown_rx.await;
                },
            )
            .map_err(|e| CallbackError::Bind {
                port,
                reason: e.to_string(),
            })?;

        let server_handle = tokio::spawn(server);
        let base_url = format!("http://{local_ip}:{port}");
        info!(%addr, %base_url, "callback server listening");

        Ok(Self {
            port,
            base_url,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Base URL of the server, `http://<local_ip>:<port>`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full callback URL for `path`.
    pub fn callback_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Router used to register callback paths.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                warn!("callback server task ended abnormally: {e}");
            }
        }
        debug!(port = self.port, "callback server stopped");
    }

    /// Find an available port in the given range.
    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    /// Check if a port is available for binding.
    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    }

    /// Local address used for outbound traffic to `target`.
    ///
    /// Connecting a UDP socket sends nothing; it only resolves the route.
    fn detect_local_ip(target: IpAddr) -> Option<IpAddr> {
        let bind_addr = match target {
            IpAddr::V4(_) => "0.0.0.0:0",
            IpAddr::V6(_) => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr).ok()?;
        socket.connect(SocketAddr::new(target, DEVICE_PORT)).ok()?;
        Some(socket.local_addr().ok()?.ip())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn notify_route(
    router: Arc<EventRouter>,
    errors: mpsc::UnboundedSender<CallbackError>,
) -> impl Filter<Extract = (warp::reply::WithStatus<&'static str>,), Error = warp::Rejection> + Clone
{
    warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::header::optional::<u32>("seq"))
        .and(warp::body::bytes())
        .then(
            move |method: Method,
                  path: warp::path::FullPath,
                  sid: Option<String>,
                  nt: Option<String>,
                  nts: Option<String>,
                  seq: Option<u32>,
                  body: Bytes| {
                let router = router.clone();
                let errors = errors.clone();
                async move {
                    if method.as_str() != "NOTIFY" {
                        return warp::reply::with_status(
                            "Method not allowed",
                            StatusCode::METHOD_NOT_ALLOWED,
                        );
                    }

                    let path = path.as_str().to_string();
                    debug!(%path, bytes = body.len(), ?seq, "NOTIFY received");

                    let subscription_id =
                        match validate_upnp_headers(sid, nt.as_deref(), nts.as_deref()) {
                            Ok(sid) => sid,
                            Err(reason) => {
                                let _ = errors.send(CallbackError::InvalidHeaders { path, reason });
                                return warp::reply::with_status(
                                    "Invalid UPnP headers",
                                    StatusCode::BAD_REQUEST,
                                );
                            }
                        };

                    let payload = NotificationPayload {
                        path,
                        subscription_id,
                        sequence: seq,
                        event_xml: String::from_utf8_lossy(&body).into_owned(),
                    };

                    match router.route_event(payload).await {
                        Ok(()) => warp::reply::with_status("", StatusCode::OK),
                        Err(e) => {
                            let _ = errors.send(e);
                            warp::reply::with_status(
                                "Subscription not found",
                                StatusCode::PRECONDITION_FAILED,
                            )
                        }
                    }
                }
            },
        )
}

/// Validate UPnP event notification headers, returning the SID.
///
/// SID is required. NT and NTS are optional, but when both are present they
/// must be `upnp:event` and `upnp:propchange`.
fn validate_upnp_headers(
    sid: Option<String>,
    nt: Option<&str>,
    nts: Option<&str>,
) -> Result<String, String> {
    let sid = sid.ok_or_else(|| "missing SID header".to_string())?;

    if let (Some(nt), Some(nts)) = (nt, nts) {
        if nt != "upnp:event" || nts != "upnp:propchange" {
            return Err(format!("unexpected NT/NTS {nt}/{nts}"));
        }
    }

    Ok(sid)
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid UPnP headers")
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(message, code))
}
