use axum::{
    extract::{Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap,
    },
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use tcal_core::{ical::generator::Emitter, ical_export, schedule_client};

use crate::{error::AppResult, google::CalendarSync, page, session::Session, AppState};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQueryParams {
    /// comma separated categories to leave out
    #[serde(default)]
    exclude: Option<String>,
}

impl ExportQueryParams {
    fn excluded(&self) -> Vec<&str> {
        self.exclude
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordsQueryParams {
    link: String,
}

/// Replace the user's TrashCalendar with the calendar in the session.
pub async fn sync(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = Session::load(state.sessions.as_ref(), &headers).await;
    let Some(calendar) = session.data.calendar else {
        return Ok(Redirect::to("/").into_response());
    };
    let Some(access_token) = session.data.access_token else {
        return Ok(Redirect::to("/login").into_response());
    };
    let today = chrono::Local::now().date_naive();
    let report = CalendarSync::new(&state.http, &access_token, &state.config.source_url)
        .run(&calendar, today)
        .await?;
    tracing::info!(
        events = report.created_events.len(),
        past = report.past_dates,
        "calendar synced"
    );
    Ok(Html(page::sync_report(&report)).into_response())
}

/// Download the calendar in the session as an iCalendar file.
pub async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query_params): Query<ExportQueryParams>,
) -> Response {
    let session = Session::load(state.sessions.as_ref(), &headers).await;
    let Some(mut calendar) = session.data.calendar else {
        return Redirect::to("/").into_response();
    };
    calendar.exclude(&query_params.excluded());
    let ical_calendar = ical_export::to_ical(&calendar, session.data.schedule_link.as_deref());
    (
        [
            (CONTENT_TYPE, "text/calendar"),
            (CONTENT_DISPOSITION, "attachment; filename=\"calendar.ics\""),
        ],
        ical_calendar.generate(),
    )
        .into_response()
}

/// The scraped table rows of a schedule link, without aggregation.
pub async fn records(
    State(state): State<AppState>,
    Query(query_params): Query<RecordsQueryParams>,
) -> AppResult<Response> {
    let schedule =
        schedule_client::get(&state.http, &query_params.link, &state.config.schedule).await?;
    Ok(Json(schedule.records).into_response())
}
