//! Google login with the OAuth 2 authorization code flow.

use serde::Deserialize;
use url::Url;

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

static DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
static SCOPES: [&str; 5] = [
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

/// The endpoints announced by the provider's discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub picture: Option<String>,
}

pub async fn provider_config(client: &reqwest::Client) -> AppResult<ProviderConfig> {
    let provider_config = client
        .get(DISCOVERY_URL)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(AppError::upstream("discovery"))?
        .json()
        .await
        .map_err(AppError::upstream("discovery"))?;
    Ok(provider_config)
}

/// Build the URL the user is sent to for login.
pub fn authorization_url(
    provider: &ProviderConfig,
    config: &Config,
    state: &str,
) -> AppResult<Url> {
    let url = Url::parse_with_params(
        &provider.authorization_endpoint,
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri().as_str()),
            ("scope", SCOPES.join(" ").as_str()),
            ("state", state),
        ],
    )
    .map_err(|err| anyhow::anyhow!("invalid authorization endpoint: {err}"))?;
    Ok(url)
}

/// Exchange the authorization code for an access token.
pub async fn exchange_code(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    config: &Config,
    code: &str,
) -> AppResult<TokenResponse> {
    let redirect_uri = config.redirect_uri();
    let response = client
        .post(&provider.token_endpoint)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(AppError::upstream("token"))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(%status, %body, "token exchange failed");
        return Err(AppError::Unauthorized(String::from("Token exchange failed.")));
    }
    let token = response.json().await.map_err(AppError::upstream("token"))?;
    Ok(token)
}

pub async fn user_info(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    access_token: &str,
) -> AppResult<UserInfo> {
    let user_info = client
        .get(&provider.userinfo_endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(AppError::upstream("userinfo"))?
        .json()
        .await
        .map_err(AppError::upstream("userinfo"))?;
    Ok(user_info)
}
