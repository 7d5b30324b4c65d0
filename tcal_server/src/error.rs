//! Error handling for the request handlers.
//!
//! [`AppError`] implements `IntoResponse`, so handlers can use `?` and the user
//! gets an error page with a fitting status code.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::page;

#[derive(Debug, Error)]
pub enum AppError {
    /// Extracting or normalizing the schedule failed.
    #[error(transparent)]
    Schedule(#[from] tcal_core::Error),

    /// A request to the identity provider or the calendar API failed.
    #[error("request to {service} failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn upstream(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| AppError::Upstream { service, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Schedule(tcal_core::Error::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Schedule(tcal_core::Error::Http(_)) => StatusCode::BAD_GATEWAY,
            AppError::Schedule(tcal_core::Error::InvalidLink(_)) => StatusCode::BAD_REQUEST,
            AppError::Schedule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                String::from("Internal server error")
            }
            err if status.is_server_error() => {
                tracing::error!(%err, "request failed");
                err.to_string()
            }
            err => {
                tracing::warn!(%err, "request rejected");
                err.to_string()
            }
        };
        (status, Html(page::error(&message))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
