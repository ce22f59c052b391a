//! Error types for the webcal proxy pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::fetch::dial::DialAttempt;

/// Errors compiling `FIELD=PATTERN` match rules.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("invalid match parameter #{index}: {rule:?}, should be <FIELD>=<regexp>")]
    Malformed { index: usize, rule: String },

    #[error("bad regexp in match parameter #{index} {rule:?}: {source}")]
    InvalidPattern {
        index: usize,
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors turning calendar text into a document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("not an iCalendar document: missing BEGIN:VCALENDAR")]
    NotACalendar,

    #[error("malformed iCalendar document: {0}")]
    Syntax(String),

    #[error("calendar is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

/// Errors encoding or decoding a cache envelope, one variant per codec stage.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("error creating cache: {0}")]
    Encode(String),

    #[error("error decoding cache: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("error decoding cache headers: {0}")]
    Header(String),

    #[error("error decoding cache body: {0}")]
    Body(#[source] std::io::Error),

    #[error("error parsing cached calendar: {0}")]
    Parse(#[from] ParseError),
}

/// Errors fetching an upstream calendar.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid calendar url {0:?}")]
    InvalidUrl(String),

    #[error("unsupported protocol scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("failed to lookup host {host:?}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to dial port {port} on any address of {host:?}: {}", format_attempts(.attempts))]
    Dial {
        host: String,
        port: u16,
        attempts: Vec<DialAttempt>,
    },

    #[error("request failed: {0}")]
    Request(String),

    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("redirect is not allowed (status {status}, location {location:?})")]
    Redirect {
        status: u16,
        location: Option<String>,
    },

    #[error("bad status: {0}")]
    BadStatus(http::StatusCode),

    #[error("not a calendar: content type {0:?}")]
    WrongContentType(String),

    #[error("error reading body: {0}")]
    Body(String),

    #[error("error parsing calendar: {0}")]
    Parse(#[from] ParseError),

    #[error("connection pool closed")]
    PoolClosed,
}

fn format_attempts(attempts: &[DialAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidates".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coarse classification of a [`ProxyError`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied something unusable.
    InvalidInput,
    /// The upstream calendar could not be fetched.
    Upstream,
    /// The upstream answered with something that isn't a calendar.
    Parse,
}

/// Errors surfaced by the pipeline to its caller.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Bad inc argument: {0}")]
    Include(#[source] MatchError),

    #[error("Bad exc argument: {0}")]
    Exclude(#[source] MatchError),

    #[error("Bad argument {value:?} for {key:?}, should be boolean.")]
    InvalidBool { key: &'static str, value: String },

    #[error("Bad argument {0:?} for \"month\", should be YYYY-MM.")]
    InvalidMonth(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Include(_)
            | ProxyError::Exclude(_)
            | ProxyError::InvalidBool { .. }
            | ProxyError::InvalidMonth(_) => ErrorKind::InvalidInput,
            ProxyError::Fetch(FetchError::InvalidUrl(_) | FetchError::UnsupportedScheme(_)) => {
                ErrorKind::InvalidInput
            }
            ProxyError::Fetch(FetchError::Parse(_)) => ErrorKind::Parse,
            ProxyError::Fetch(_) => ErrorKind::Upstream,
        }
    }

    /// Message safe to show to the caller.
    ///
    /// Upstream failures are deliberately vague: the detailed error names the
    /// addresses we refused to dial and belongs in the log only.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::Fetch(FetchError::InvalidUrl(_)) => {
                "Bad url. Include a protocol, host, and path, eg: webcal://example.com/events"
                    .to_string()
            }
            ProxyError::Fetch(FetchError::UnsupportedScheme(_)) => {
                "Unsupported protocol scheme, url should be webcal, https, or http.".to_string()
            }
            ProxyError::Fetch(FetchError::Parse(_)) => "Calendar could not be parsed".to_string(),
            ProxyError::Fetch(_) => "Failed to fetch calendar".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
