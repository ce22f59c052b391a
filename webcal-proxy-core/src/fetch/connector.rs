//! A hyper connector that only dials vetted addresses.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::Service;

use crate::error::FetchError;
use crate::fetch::dial::{self, DialPolicy};

/// Plain TCP connector for `hyper_util`'s client, backed by [`dial::connect`].
///
/// TLS is layered on top by `hyper_rustls::HttpsConnector`.
#[derive(Debug, Clone)]
pub struct SafeConnector {
    policy: DialPolicy,
}

impl SafeConnector {
    pub fn new(policy: DialPolicy) -> Self {
        SafeConnector { policy }
    }
}

impl Service<Uri> for SafeConnector {
    type Response = TokioIo<TcpStream>;
    type Error = FetchError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let policy = self.policy.clone();
        Box::pin(async move {
            let host = uri
                .host()
                .ok_or_else(|| FetchError::InvalidUrl(uri.to_string()))?
                .to_string();
            let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
                Some("https") => 443,
                _ => 80,
            });

            let stream = dial::connect(&host, port, &policy).await?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(TokioIo::new(stream))
        })
    }
}
