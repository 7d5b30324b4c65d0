use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tcal_core::schedule_client;

use crate::{
    page::{self, Content},
    session::{with_cookie, Session},
    AppState,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LinkForm {
    link: String,
}

pub async fn show(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let session = Session::load(state.sessions.as_ref(), &headers).await;
    Html(page::index(session.data.user.as_ref(), None))
}

/// Scrape the submitted schedule link and remember the calendar in the session.
///
/// Failures are shown on the page next to the form and leave the session untouched.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LinkForm>,
) -> Response {
    let mut session = Session::load(state.sessions.as_ref(), &headers).await;
    let schedule =
        match schedule_client::get(&state.http, &form.link, &state.config.schedule).await {
            Ok(schedule) => schedule,
            Err(err) => {
                tracing::warn!(link = %form.link, %err, "schedule rejected");
                let body = page::index(
                    session.data.user.as_ref(),
                    Some(&Content::Error(err.to_string())),
                );
                return Html(body).into_response();
            }
        };
    tracing::info!(
        link = %form.link,
        categories = schedule.calendar.len(),
        dates = schedule.calendar.date_count(),
        "schedule scraped"
    );
    // the fetch can take a while, a login may have finished in the meantime
    session.refresh(state.sessions.as_ref()).await;
    session.data.calendar = Some(schedule.calendar.clone());
    session.data.schedule_link = Some(form.link.trim().to_string());
    let body = page::index(
        session.data.user.as_ref(),
        Some(&Content::Schedule(&schedule)),
    );
    let cookie = session
        .save(state.sessions.as_ref(), state.config.secure_cookies())
        .await;
    with_cookie(cookie, Html(body))
}
