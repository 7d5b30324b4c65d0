//! Per-browser session state behind a small storage capability.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tcal_core::schedule::CategoryCalendar;
use tokio::sync::RwLock;

pub static COOKIE_NAME: &str = "tcal_session";
/// How long an unused session is kept, on the server and in the browser.
pub static SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Everything remembered between requests of one browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: Option<UserProfile>,
    pub access_token: Option<String>,
    /// The `state` parameter of a login in progress.
    pub oauth_state: Option<String>,
    /// The last scraped schedule.
    pub calendar: Option<CategoryCalendar>,
    pub schedule_link: Option<String>,
}

/// Where session data lives between requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Option<SessionData>;
    async fn save(&self, id: &str, data: SessionData);
    async fn remove(&self, id: &str);
}

/// Sessions kept in memory until they have not been used for [`SESSION_TTL_SECONDS`].
///
/// Expired sessions are dropped when they are loaded and swept whenever a session is saved.
#[derive(Debug)]
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

#[derive(Debug)]
struct StoredSession {
    data: SessionData,
    last_seen: DateTime<Utc>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::default(),
        }
    }

    fn is_expired(&self, stored: &StoredSession, now: DateTime<Utc>) -> bool {
        now - stored.last_seen > self.ttl
    }

    async fn load_at(&self, id: &str, now: DateTime<Utc>) -> Option<SessionData> {
        let mut sessions = self.sessions.write().await;
        if self.is_expired(sessions.get(id)?, now) {
            sessions.remove(id);
            tracing::debug!(%id, "session expired");
            return None;
        }
        let stored = sessions.get_mut(id)?;
        stored.last_seen = now;
        Some(stored.data.clone())
    }

    async fn save_at(&self, id: &str, data: SessionData, now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| !self.is_expired(stored, now));
        if sessions.len() < before {
            tracing::debug!(expired = before - sessions.len(), "swept sessions");
        }
        sessions.insert(
            id.to_string(),
            StoredSession {
                data,
                last_seen: now,
            },
        );
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(SESSION_TTL_SECONDS))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Option<SessionData> {
        self.load_at(id, Utc::now()).await
    }

    async fn save(&self, id: &str, data: SessionData) {
        self.save_at(id, data, Utc::now()).await
    }

    async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }
}

/// The session of the current request.
#[derive(Debug)]
pub struct Session {
    id: String,
    is_new: bool,
    pub data: SessionData,
}

impl Session {
    /// Load the session named by the request cookie, or start a new one.
    ///
    /// A cookie naming an unknown session starts a new session with a fresh id.
    pub async fn load(store: &dyn SessionStore, headers: &HeaderMap) -> Self {
        if let Some(id) = session_id(headers) {
            if let Some(data) = store.load(&id).await {
                return Self {
                    id,
                    is_new: false,
                    data,
                };
            }
        }
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            is_new: true,
            data: SessionData::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the data with what is currently stored under this session's id.
    ///
    /// Used after a long await, so that changes made by concurrent requests are not lost.
    pub async fn refresh(&mut self, store: &dyn SessionStore) {
        if let Some(data) = store.load(&self.id).await {
            self.data = data;
        }
    }

    /// Store the session, returning the cookie to set if the browser does not know it yet.
    pub async fn save(self, store: &dyn SessionStore, secure: bool) -> Option<String> {
        store.save(&self.id, self.data).await;
        self.is_new.then(|| session_cookie(&self.id, secure))
    }
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .filter_map(|cookie_str| cookie::Cookie::parse(cookie_str.trim()).ok())
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
}

fn cookie_attributes(max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}")
}

pub fn session_cookie(id: &str, secure: bool) -> String {
    format!(
        "{COOKIE_NAME}={id}; {}",
        cookie_attributes(SESSION_TTL_SECONDS, secure)
    )
}

pub fn removal_cookie(secure: bool) -> String {
    format!("{COOKIE_NAME}=; {}", cookie_attributes(0, secure))
}

/// Attach a `Set-Cookie` header to a response.
pub fn with_cookie(cookie: Option<String>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(value) = cookie.and_then(|cookie| HeaderValue::from_str(&cookie).ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
