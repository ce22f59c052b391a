//! Filtered calendar endpoint, for calendar apps subscribing to the proxy.

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use webcal_proxy_core::CalendarRequest;
use webcal_proxy_core::ics::{CALENDAR_MEDIA_TYPE, serialize_calendar};

use crate::routes::{AppError, Params, request_id};
use crate::state::AppState;

/// GET /?cal=...&inc=...&exc=...&mrg=... - the filtered upstream calendar
pub async fn get_calendar(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = Params::parse(query.as_deref().unwrap_or_default().as_bytes());

    let request = CalendarRequest {
        url: params.first("cal").unwrap_or_default(),
        includes: params.all("inc"),
        excludes: params.all("exc"),
        merge: params.first("mrg"),
        request_id: request_id(&headers),
    };
    let calendar = state.proxy.calendar(&request).await?;

    Ok(([(CONTENT_TYPE, CALENDAR_MEDIA_TYPE)], serialize_calendar(&calendar)).into_response())
}
