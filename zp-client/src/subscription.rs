//! GENA subscription requests (SUBSCRIBE, renewal, UNSUBSCRIBE).

use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::error::{Result, ZpError};

/// Delay before retrying a renewal that failed.
const RENEWAL_RETRY: Duration = Duration::from_secs(10);

/// One accepted subscription to one service's event URL.
#[derive(Debug)]
pub(crate) struct ServiceSubscription {
    /// Subscription ID (SID) returned by the device
    sid: String,
    /// The eventSubURL this subscription is for
    endpoint: Url,
    /// Duration the device granted
    granted: Duration,
    /// When the next renewal is due
    next_renewal: Instant,
}

impl ServiceSubscription {
    /// Send a SUBSCRIBE request for `endpoint` with `callback` as delivery URL.
    ///
    /// # Errors
    ///
    /// `ZpError::Subscribe` if the request fails, is refused, or the response
    /// has no SID.
    pub(crate) async fn subscribe(
        http: &Client,
        endpoint: Url,
        callback: &str,
        requested: Duration,
    ) -> Result<Self> {
        let failed = |reason: String| ZpError::Subscribe {
            url: endpoint.to_string(),
            reason,
        };

        let response = http
            .request(gena_method("SUBSCRIBE"), endpoint.clone())
            .header("CALLBACK", format!("<{callback}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{}", requested.as_secs()))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let sid = header(response.headers(), "SID")
            .ok_or_else(|| failed("missing SID header in response".to_string()))?
            .to_string();
        let granted = header(response.headers(), "TIMEOUT")
            .and_then(parse_timeout)
            .unwrap_or(requested);

        tracing::debug!(%sid, %endpoint, granted = granted.as_secs(), "subscribed");

        Ok(Self {
            sid,
            endpoint,
            granted,
            next_renewal: Instant::now() + granted / 2,
        })
    }

    /// Renew the subscription for another granted period.
    ///
    /// On failure the next attempt is scheduled shortly after.
    pub(crate) async fn renew(&mut self, http: &Client) -> Result<()> {
        match self.send_renewal(http).await {
            Ok(granted) => {
                if let Some(granted) = granted {
                    self.granted = granted;
                }
                self.next_renewal = Instant::now() + self.granted / 2;
                tracing::debug!(sid = %self.sid, "subscription renewed");
                Ok(())
            }
            Err(reason) => {
                self.next_renewal = Instant::now() + RENEWAL_RETRY;
                Err(ZpError::Renew {
                    url: self.endpoint.to_string(),
                    reason,
                })
            }
        }
    }

    async fn send_renewal(&self, http: &Client) -> std::result::Result<Option<Duration>, String> {
        let response = http
            .request(gena_method("SUBSCRIBE"), self.endpoint.clone())
            .header("SID", &self.sid)
            .header("TIMEOUT", format!("Second-{}", self.granted.as_secs()))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        Ok(header(response.headers(), "TIMEOUT").and_then(parse_timeout))
    }

    /// Send an UNSUBSCRIBE request.
    pub(crate) async fn unsubscribe(&self, http: &Client) -> Result<()> {
        let failed = |reason: String| ZpError::Unsubscribe {
            url: self.endpoint.to_string(),
            reason,
        };

        let response = http
            .request(gena_method("UNSUBSCRIBE"), self.endpoint.clone())
            .header("SID", &self.sid)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        tracing::debug!(sid = %self.sid, "unsubscribed");
        Ok(())
    }

    pub(crate) fn sid(&self) -> &str {
        &self.sid
    }

    /// When the next renewal is due.
    pub(crate) fn next_renewal(&self) -> Instant {
        self.next_renewal
    }
}

fn gena_method(name: &'static str) -> Method {
    // Extension methods are valid tokens; only non-token bytes are rejected.
    Method::from_bytes(name.as_bytes()).unwrap_or(Method::POST)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse a GENA `TIMEOUT` header, `Second-1800` or `infinite`.
///
/// `Second-0` is rejected so the caller keeps its previous duration.
fn parse_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("infinite") {
        // Renew daily anyway.
        return Some(Duration::from_secs(2 * 86_400));
    }
    let seconds = value
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("Second-"))
        .and_then(|_| value[7..].parse::<u64>().ok())
        .filter(|&seconds| seconds > 0)?;
    Some(Duration::from_secs(seconds))
}
