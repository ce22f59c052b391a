//! Month view endpoint, posted by the browser UI.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use webcal_proxy_core::{MonthRequest, MonthView};

use crate::routes::{AppError, Params, header, request_id};
use crate::state::AppState;

/// POST / - form with cal, inc, exc, mrg, cache, user-tz and month
///
/// The subscription link uses `X-HX-Host` and `X-Forwarded-URI` when a
/// fronting proxy or the UI sets them.
pub async fn post_month(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MonthView>, AppError> {
    let params = Params::parse(&body);

    let request = MonthRequest {
        url: params.first("cal").filter(|cal| !cal.is_empty()),
        includes: params.all("inc"),
        excludes: params.all("exc"),
        merge: params.first("mrg"),
        cache: params.first("cache"),
        now: Utc::now(),
        timezone: params.first("user-tz"),
        month: params.first("month"),
        // browsers won't let scripts set Host
        host: header(&headers, "x-hx-host").or_else(|| header(&headers, "host")),
        path: header(&headers, "x-forwarded-uri"),
        request_id: request_id(&headers),
    };
    let view = state.proxy.month(&request).await?;

    Ok(Json(view))
}
