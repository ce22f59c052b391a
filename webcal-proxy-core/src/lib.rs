//! Core of the webcal proxy.
//!
//! This crate provides everything between the HTTP shell and the upstream
//! calendar server:
//! - `fetch` for SSRF-safe fetching over a bounded connection pool
//! - `matcher` and `merge` for filtering and combining events
//! - `cache` for the client-held calendar cache
//! - `month` for the month grid
//! - `pipeline` which composes them per request

pub mod cache;
pub mod error;
pub mod event;
pub mod fetch;
pub mod ics;
pub mod matcher;
pub mod merge;
pub mod month;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{CacheError, ErrorKind, FetchError, MatchError, ParseError, ProxyError, ProxyResult};
pub use pipeline::{
    CalendarRequest, FilterOptions, MonthRequest, MonthView, Proxy, subscription_url,
};
