//! The TrashCalendar web application.
//!
//! Users submit the link of their published waste collection schedule, log in with
//! Google and get the collection dates created as events in a calendar of their own.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod error;
mod google;
mod oauth;
mod page;
mod route;
mod session;

use crate::{
    config::Config,
    session::{MemorySessionStore, SessionStore},
};

/// What every handler gets.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub sessions: Arc<dyn SessionStore>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(route::index::show).post(route::index::submit))
        .route("/calendar", get(route::calendar::sync))
        .route("/calendar.ics", get(route::calendar::export))
        .route("/records", get(route::calendar::records))
        .route("/login", get(route::login::login))
        .route("/login/callback", get(route::login::callback))
        .route("/logout", get(route::login::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();
    let config = Config::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
        sessions: Arc::new(MemorySessionStore::default()),
    };
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tcal_core::schedule::CategoryCalendar;
    use tower::ServiceExt;

    use crate::{
        app,
        config::Config,
        session::{MemorySessionStore, SessionData, SessionStore, COOKIE_NAME},
        AppState,
    };

    fn get_test_state(sessions: Arc<MemorySessionStore>) -> AppState {
        let config = Config::from_lookup(|name| match name {
            "CLIENT_ID" => Some(String::from("client-id")),
            "CLIENT_SECRET" => Some(String::from("client-secret")),
            _ => None,
        })
        .unwrap();
        AppState {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            sessions,
        }
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let app = app(get_test_state(Arc::default()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"link\""));
    }

    fn submit_request(link: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("link={link}")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_invalid_link() {
        let sessions = Arc::new(MemorySessionStore::default());
        let app = app(get_test_state(sessions.clone()));
        let response = app
            .oneshot(submit_request("http%3A%2F%2Fexample.org%2Fschedule.html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("invalid link `http://example.org/schedule.html`"));
    }

    #[tokio::test]
    async fn test_rejected_submits_store_no_sessions() {
        let sessions = Arc::new(MemorySessionStore::default());
        let app = app(get_test_state(sessions.clone()));
        for _ in 0..50 {
            let response = app.clone().oneshot(submit_request("x")).await.unwrap();
            assert!(!response.headers().contains_key(header::SET_COOKIE));
        }
        assert_eq!(sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_submit_keeps_login() {
        let sessions = Arc::new(MemorySessionStore::default());
        let data = SessionData {
            access_token: Some(String::from("token")),
            ..Default::default()
        };
        sessions.save("known", data.clone()).await;
        let app = app(get_test_state(sessions.clone()));
        let mut request = submit_request("x");
        request.headers_mut().insert(
            header::COOKIE,
            format!("{COOKIE_NAME}=known").parse().unwrap(),
        );
        app.oneshot(request).await.unwrap();
        assert_eq!(sessions.load("known").await, Some(data));
    }

    #[tokio::test]
    async fn test_login_callback_rejects_wrong_state() {
        let sessions = Arc::new(MemorySessionStore::default());
        sessions
            .save(
                "known",
                SessionData {
                    oauth_state: Some(String::from("expected")),
                    ..Default::default()
                },
            )
            .await;
        let app = app(get_test_state(sessions.clone()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/login/callback?code=x&state=wrong")
                    .header(header::COOKIE, format!("{COOKIE_NAME}=known"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // the state is single use
        let data = sessions.load("known").await.unwrap();
        assert_eq!(data.oauth_state, None);
        assert_eq!(data.access_token, None);
    }

    #[tokio::test]
    async fn test_login_callback_without_pending_login() {
        let app = app(get_test_state(Arc::default()));
        for uri in [
            "/login/callback?code=x&state=anything",
            "/login/callback?code=x",
            "/login/callback?error=access_denied",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_calendar_without_schedule_redirects() {
        let app = app(get_test_state(Arc::default()));
        for uri in ["/calendar", "/calendar.ics"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(response.headers()[header::LOCATION], "/");
        }
    }

    #[tokio::test]
    async fn test_calendar_without_login_redirects() {
        let sessions = Arc::new(MemorySessionStore::default());
        let mut calendar = CategoryCalendar::new();
        calendar.extend("Szkło", [String::from("2024-01-15")]);
        sessions
            .save(
                "known",
                SessionData {
                    calendar: Some(calendar),
                    ..Default::default()
                },
            )
            .await;
        let app = app(get_test_state(sessions));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/calendar")
                    .header(header::COOKIE, format!("{COOKIE_NAME}=known"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_export() {
        let sessions = Arc::new(MemorySessionStore::default());
        let mut calendar = CategoryCalendar::new();
        calendar.extend("Szkło", [String::from("2024-01-15")]);
        calendar.extend("Bio", [String::from("2024-01-16")]);
        sessions
            .save(
                "known",
                SessionData {
                    calendar: Some(calendar),
                    ..Default::default()
                },
            )
            .await;
        let app = app(get_test_state(sessions));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/calendar.ics?exclude=Bio")
                    .header(header::COOKIE, format!("{COOKIE_NAME}=known"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/calendar");
        let body = body_text(response).await;
        assert_eq!(body.matches("BEGIN:VEVENT").count(), 1);
        assert!(body.contains("SUMMARY:Szkło"));
    }

    #[tokio::test]
    async fn test_logout_removes_session() {
        let sessions = Arc::new(MemorySessionStore::default());
        sessions.save("known", SessionData::default()).await;
        let app = app(get_test_state(sessions.clone()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/logout")
                    .header(header::COOKIE, format!("{COOKIE_NAME}=known"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert_eq!(sessions.load("known").await, None);
    }
}
