//! Fetching upstream calendars without reaching private networks.

mod connector;
pub mod dial;
mod normalize;

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION, USER_AGENT};
use http::{HeaderValue, Request};
use http_body_util::{BodyExt, Empty, Limited};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::FetchError;
use crate::ics::{CALENDAR_MEDIA_TYPE, CalendarDocument, parse_calendar};

pub use self::connector::SafeConnector;
pub use self::dial::{AddressClass, DialAttempt, DialFailure, DialPolicy};
pub use self::normalize::normalize_url;

type HttpClient = Client<HttpsConnector<SafeConnector>, Empty<Bytes>>;

/// Outbound fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upstream fetches allowed in flight at once.
    pub max_conns: usize,
    /// Bound on a whole fetch, pool wait included.
    pub timeout_secs: u64,
    /// Permit loopback upstreams. Only for tests and local development.
    pub allow_loopback: bool,
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            max_conns: 8,
            timeout_secs: 60,
            allow_loopback: false,
            user_agent: concat!("webcal-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP client for upstream calendars with a bounded connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    permits: Arc<Semaphore>,
    config: Arc<FetchConfig>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let connector = SafeConnector::new(DialPolicy {
            allow_loopback: config.allow_loopback,
            timeout: config.timeout(),
        });
        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);
        let client = Client::builder(TokioExecutor::new()).build(https_connector);

        Fetcher {
            client,
            permits: Arc::new(Semaphore::new(config.max_conns.max(1))),
            config: Arc::new(config),
        }
    }

    /// Fetch and parse the calendar at `url`.
    ///
    /// Redirects are not followed; the whole fetch, including the wait for
    /// a pool permit, is bounded by the configured timeout.
    pub async fn fetch(&self, url: &url::Url) -> Result<CalendarDocument, FetchError> {
        let limit = self.config.timeout();
        timeout(limit, self.fetch_unbounded(url))
            .await
            .map_err(|_| FetchError::Timeout(limit))?
    }

    async fn fetch_unbounded(&self, url: &url::Url) -> Result<CalendarDocument, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::PoolClosed)?;

        let request = Request::get(url.as_str())
            .header(USER_AGENT, self.config.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        tracing::debug!(url = %url, "Fetching calendar");
        let response = self
            .client
            .request(request)
            .await
            .map_err(from_client_error)?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::Redirect {
                status: status.as_u16(),
                location,
            });
        }
        if !status.is_success() {
            return Err(FetchError::BadStatus(status));
        }
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            if !is_calendar_media_type(content_type) {
                return Err(FetchError::WrongContentType(
                    String::from_utf8_lossy(content_type.as_bytes()).into_owned(),
                ));
            }
        }

        let body = Limited::new(response.into_body(), self.config.max_body_bytes)
            .collect()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_bytes();

        Ok(parse_calendar(&String::from_utf8_lossy(&body))?)
    }
}

/// Whether a Content-Type header names `text/calendar`, ignoring parameters.
pub fn is_calendar_media_type(value: &HeaderValue) -> bool {
    value
        .to_str()
        .ok()
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(CALENDAR_MEDIA_TYPE))
}

/// Recover the connector's own error from hyper's wrapping of it.
fn from_client_error(err: hyper_util::client::legacy::Error) -> FetchError {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(fetch_error) = cause.downcast_ref::<FetchError>() {
            return match fetch_error {
                FetchError::Dial {
                    host,
                    port,
                    attempts,
                } => FetchError::Dial {
                    host: host.clone(),
                    port: *port,
                    attempts: attempts.clone(),
                },
                FetchError::Resolution { host, source } => FetchError::Resolution {
                    host: host.clone(),
                    source: std::io::Error::new(source.kind(), source.to_string()),
                },
                other => FetchError::Request(other.to_string()),
            };
        }
        source = cause.source();
    }
    FetchError::Request(err.to_string())
}
