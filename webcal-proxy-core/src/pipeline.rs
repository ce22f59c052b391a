//! Request pipeline: validate, fetch or reuse the cache, filter, sort,
//! merge, then hand back a calendar or a month grid.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use url::Url;

use crate::cache::CacheEnvelope;
use crate::error::{ProxyError, ProxyResult};
use crate::event::local_datetime;
use crate::fetch::{Fetcher, normalize_url};
use crate::ics::{CalendarDocument, EventComponent};
use crate::matcher::MatchGroup;
use crate::merge::merge_events;
use crate::month::{Day, build_month};

/// Which upstream events reach the downstream calendar.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub includes: MatchGroup,
    pub excludes: MatchGroup,
    pub merge: bool,
}

impl FilterOptions {
    /// No includes means every event with a summary is included.
    pub fn parse<S: AsRef<str>>(
        includes: &[S],
        excludes: &[S],
        merge: Option<&str>,
    ) -> ProxyResult<Self> {
        let merge = match merge {
            Some(value) if !value.is_empty() => parse_bool("mrg", value)?,
            _ => false,
        };

        let mut includes = MatchGroup::parse(includes).map_err(ProxyError::Include)?;
        if includes.is_empty() {
            includes = MatchGroup::default_include();
        }
        let excludes = MatchGroup::parse(excludes).map_err(ProxyError::Exclude)?;

        Ok(FilterOptions {
            includes,
            excludes,
            merge,
        })
    }

    pub fn keeps(&self, event: &EventComponent) -> bool {
        self.includes.matches(event) && !self.excludes.matches(event)
    }
}

/// Parse a boolean the way query strings spell them: `1`, `t`, `true`, `0`, ...
pub fn parse_bool(key: &'static str, value: &str) -> ProxyResult<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => {
            tracing::warn!(key, value, "Invalid boolean parameter");
            Err(ProxyError::InvalidBool {
                key,
                value: value.to_string(),
            })
        }
    }
}

/// Build the downstream calendar from the upstream one.
///
/// Calendar properties and non-event components are copied first, in
/// order. Kept events follow, stably sorted by start in `reference` and
/// merged when asked. Events without a start are dropped.
pub fn downstream(
    upstream: &CalendarDocument,
    options: &FilterOptions,
    reference: Tz,
) -> CalendarDocument {
    let mut calendar = CalendarDocument {
        properties: upstream.properties.clone(),
        components: upstream
            .components
            .iter()
            .filter(|c| c.as_event().is_none())
            .cloned()
            .collect(),
    };

    let mut events: Vec<(DateTime<Tz>, &EventComponent)> = upstream
        .events()
        .filter(|event| options.keeps(event))
        .filter_map(|event| match event.start() {
            Some(start) => Some((start.in_zone(reference), event)),
            None => {
                tracing::warn!(uid = ?event.uid(), summary = ?event.summary(), "Event has no start time, dropping");
                None
            }
        })
        .collect();
    events.sort_by_key(|(start, _)| *start);

    let mut events: Vec<EventComponent> = events.into_iter().map(|(_, e)| e.clone()).collect();
    if options.merge {
        events = merge_events(events, reference);
    }
    for event in events {
        calendar.push_event(event);
    }

    calendar
}

/// Ask for the filtered calendar at `url`.
#[derive(Debug, Clone, Default)]
pub struct CalendarRequest {
    pub url: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub merge: Option<String>,
    pub request_id: String,
}

/// Ask for a month grid, optionally filled from the calendar at `url`.
#[derive(Debug, Clone, Default)]
pub struct MonthRequest {
    pub url: Option<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub merge: Option<String>,
    /// A cache string handed out by an earlier response.
    pub cache: Option<String>,
    pub now: DateTime<Utc>,
    /// IANA zone of the viewer; unknown or absent means UTC.
    pub timezone: Option<String>,
    /// `YYYY-MM`; absent means the month of `now`.
    pub month: Option<String>,
    /// Host and path the browser reached the proxy on, for the subscription link.
    pub host: Option<String>,
    pub path: Option<String>,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthView {
    pub title: String,
    /// `webcal://` link subscribing to the filtered calendar through this proxy.
    pub url: Option<String>,
    pub days: Vec<Day>,
    /// Set when the calendar was freshly fetched.
    pub cache: Option<String>,
}

#[derive(Clone)]
pub struct Proxy {
    fetcher: Fetcher,
}

impl Proxy {
    pub fn new(fetcher: Fetcher) -> Self {
        Proxy { fetcher }
    }

    #[tracing::instrument(skip_all, fields(request_id = %request.request_id))]
    pub async fn calendar(&self, request: &CalendarRequest) -> ProxyResult<CalendarDocument> {
        let options =
            FilterOptions::parse(&request.includes, &request.excludes, request.merge.as_deref())?;
        let url = normalize_url(&request.url)?;

        let upstream = self.fetch(&url).await?;
        Ok(downstream(&upstream, &options, Tz::UTC))
    }

    #[tracing::instrument(skip_all, fields(request_id = %request.request_id))]
    pub async fn month(&self, request: &MonthRequest) -> ProxyResult<MonthView> {
        let zone = viewer_zone(request.timezone.as_deref());
        let now = request.now.with_timezone(&zone);
        let target = match request.month.as_deref().map(str::trim) {
            Some(month) if !month.is_empty() => parse_month(month, zone)?,
            _ => now,
        };

        let Some(raw_url) = request.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            let month = build_month(target, now, None);
            return Ok(MonthView {
                title: month.title,
                url: None,
                days: month.days,
                cache: None,
            });
        };

        let options =
            FilterOptions::parse(&request.includes, &request.excludes, request.merge.as_deref())?;
        let url = normalize_url(raw_url)?;

        let (upstream, cache) = match cached(request.cache.as_deref(), &url) {
            Some(upstream) => (upstream, None),
            None => {
                let upstream = self.fetch(&url).await?;
                let cache = match CacheEnvelope::new(url.as_str(), upstream.clone()).encode() {
                    Ok(cache) => Some(cache),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to create cache");
                        None
                    }
                };
                (upstream, cache)
            }
        };

        let calendar = downstream(&upstream, &options, zone);
        let month = build_month(target, now, Some(&calendar));
        let link = request
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .and_then(|host| subscription_url(host, request.path.as_deref(), request));
        if link.is_none() {
            tracing::debug!(host = ?request.host, "No usable host for the subscription link");
        }

        Ok(MonthView {
            title: month.title,
            url: link.map(String::from),
            days: month.days,
            cache,
        })
    }

    async fn fetch(&self, url: &Url) -> ProxyResult<CalendarDocument> {
        self.fetcher.fetch(url).await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to fetch calendar");
            ProxyError::Fetch(e)
        })
    }
}

/// The link a calendar client subscribes to for the calendar `request` shows.
///
/// The query carries the raw `cal`, `exc`, `inc` and `mrg` values, in that
/// order, so the proxy applies the same filters when the client polls it.
pub fn subscription_url(host: &str, path: Option<&str>, request: &MonthRequest) -> Option<Url> {
    let mut link = Url::parse(&format!("webcal://{host}")).ok()?;
    link.set_path(path.filter(|p| !p.is_empty()).unwrap_or("/"));

    {
        let mut query = link.query_pairs_mut();
        if let Some(cal) = request.url.as_deref() {
            query.append_pair("cal", cal.trim());
        }
        for exc in &request.excludes {
            query.append_pair("exc", exc);
        }
        for inc in &request.includes {
            query.append_pair("inc", inc);
        }
        if let Some(mrg) = request.merge.as_deref() {
            query.append_pair("mrg", mrg);
        }
    }

    Some(link)
}

/// The cached calendar, if the cache decodes and was made for `url`.
fn cached(cache: Option<&str>, url: &Url) -> Option<CalendarDocument> {
    let cache = cache.filter(|c| !c.trim().is_empty())?;

    let envelope = match CacheEnvelope::decode(cache) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode cache, continuing without");
            return None;
        }
    };
    if envelope.url != url.as_str() {
        tracing::debug!(cached_url = %envelope.url, "Cache was for another URL, ignoring");
        return None;
    }

    tracing::debug!("Using cached calendar");
    Some(envelope.calendar)
}

fn viewer_zone(timezone: Option<&str>) -> Tz {
    let Some(name) = timezone.map(str::trim).filter(|n| !n.is_empty()) else {
        return Tz::UTC;
    };
    match name.parse::<Tz>() {
        Ok(zone) => {
            tracing::debug!(timezone = name, "Using viewer time zone");
            zone
        }
        Err(e) => {
            tracing::warn!(timezone = name, error = %e, "Unknown time zone, using UTC");
            Tz::UTC
        }
    }
}

fn parse_month(month: &str, zone: Tz) -> ProxyResult<DateTime<Tz>> {
    let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map_err(|_| ProxyError::InvalidMonth(month.to_string()))?;
    Ok(local_datetime(zone, first.and_time(NaiveTime::MIN)))
}
