use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    oauth,
    session::{removal_cookie, with_cookie, Session, UserProfile},
    AppState,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQueryParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Send the user to the identity provider.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let secure = state.config.secure_cookies();
    let mut session = Session::load(state.sessions.as_ref(), &headers).await;
    let provider = oauth::provider_config(&state.http).await?;
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();
    let url = oauth::authorization_url(&provider, &state.config, &csrf_state)?;
    session.data.oauth_state = Some(csrf_state);
    let cookie = session.save(state.sessions.as_ref(), secure).await;
    Ok(with_cookie(cookie, Redirect::to(url.as_str())))
}

/// Finish the login: exchange the code and remember the user.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query_params): Query<CallbackQueryParams>,
) -> AppResult<Response> {
    let secure = state.config.secure_cookies();
    let mut session = Session::load(state.sessions.as_ref(), &headers).await;
    let expected_state = session.data.oauth_state.take();
    if let Some(error) = query_params.error {
        session.save(state.sessions.as_ref(), secure).await;
        return Err(AppError::Unauthorized(format!("Login failed: {error}")));
    }
    if expected_state.is_none() || query_params.state != expected_state {
        session.save(state.sessions.as_ref(), secure).await;
        return Err(AppError::Unauthorized(String::from("Login state mismatch.")));
    }
    let code = query_params
        .code
        .ok_or_else(|| AppError::BadRequest(String::from("Missing authorization code.")))?;
    let provider = oauth::provider_config(&state.http).await?;
    let token = oauth::exchange_code(&state.http, &provider, &state.config, &code).await?;
    let user_info = oauth::user_info(&state.http, &provider, &token.access_token).await?;
    if !user_info.email_verified {
        tracing::warn!(email = %user_info.email, "login with unverified email");
        session.save(state.sessions.as_ref(), secure).await;
        return Ok((
            StatusCode::BAD_REQUEST,
            "User email not available or not verified by Google.",
        )
            .into_response());
    }
    tracing::info!(email = %user_info.email, "logged in");
    session.data.user = Some(UserProfile {
        email: user_info.email,
        name: user_info.given_name,
        picture: user_info.picture,
    });
    session.data.access_token = Some(token.access_token);
    let cookie = session.save(state.sessions.as_ref(), secure).await;
    Ok(with_cookie(cookie, Redirect::to("/")))
}

/// Forget everything about the user, including the scraped calendar.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = Session::load(state.sessions.as_ref(), &headers).await;
    state.sessions.remove(session.id()).await;
    with_cookie(
        Some(removal_cookie(state.config.secure_cookies())),
        Redirect::to("/"),
    )
}
