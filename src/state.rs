use webcal_proxy_core::Proxy;
use webcal_proxy_core::fetch::{FetchConfig, Fetcher};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub proxy: Proxy,
}

impl AppState {
    pub fn new(fetch: FetchConfig) -> Self {
        AppState {
            proxy: Proxy::new(Fetcher::new(fetch)),
        }
    }
}
