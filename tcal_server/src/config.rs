use std::env;

use anyhow::{Context, Result};
use tcal_core::schedule::ScheduleOptions;
use url::Url;

static DEFAULT_PORT: u16 = 8008;
static DEFAULT_BASE_URL: &str = "http://localhost:8008";

/// Server configuration, read from the environment (and a `.env` file).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// The externally visible address of this server, used for the OAuth redirect.
    pub base_url: Url,
    pub client_id: String,
    pub client_secret: String,
    /// Linked from every created calendar event.
    pub source_url: String,
    pub schedule: ScheduleOptions,
}

impl Config {
    /// Load the configuration from environment variables.
    ///
    /// Required: `CLIENT_ID`, `CLIENT_SECRET`.
    /// Optional: `PORT`, `BASE_URL`, `SOURCE_URL`, `TABLE_SELECTOR`, `PERIOD_COLUMN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(port) => port.parse().context("PORT must be a valid number")?,
            None => DEFAULT_PORT,
        };
        let base_url = lookup("BASE_URL").unwrap_or_else(|| String::from(DEFAULT_BASE_URL));
        let base_url = Url::parse(&base_url).context("BASE_URL must be a valid URL")?;
        let mut schedule = ScheduleOptions::default();
        if let Some(selector) = lookup("TABLE_SELECTOR") {
            schedule.selector = selector;
        }
        if let Some(period_column) = lookup("PERIOD_COLUMN") {
            schedule.period_column = period_column;
        }
        Ok(Self {
            port,
            source_url: lookup("SOURCE_URL").unwrap_or_else(|| base_url.to_string()),
            base_url,
            client_id: lookup("CLIENT_ID").context("CLIENT_ID must be set")?,
            client_secret: lookup("CLIENT_SECRET").context("CLIENT_SECRET must be set")?,
            schedule,
        })
    }

    /// Whether the session cookie may only travel over https.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// The address the identity provider redirects back to after login.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/login/callback",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}
