//! Matter API client
//!
//! Thin reqwest wrapper over the endpoints the sync needs. It never retries;
//! the engine owns retry policy.
//!
//! ## Endpoints
//!
//! - `POST /qr_login/trigger/` - start device pairing
//! - `POST /qr_login/exchange/` - poll pairing for tokens
//! - `POST /token/refresh/` - trade a refresh token for a new pair
//! - `GET  /library_items/highlights_feed/` - paginated highlights feed

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{FeedEntry, FeedResponse};

/// Default API host
pub const MATTER_API_HOST: &str = "https://api.getmatter.app/api/v11";

/// Client type announced when pairing
pub const CLIENT_TYPE: &str = "integration";

/// Errors from the Matter API
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server rejected our credentials, or no usable token was issued
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-success response that is not an auth failure
    #[error("Matter request failed with status {status}: {body}")]
    Request { status: u16, body: String },

    /// Network or decoding failure
    #[error("Matter request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

/// One page of the feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub records: Vec<FeedEntry>,
    pub next: Option<String>,
}

impl From<FeedResponse> for FeedPage {
    fn from(response: FeedResponse) -> Self {
        Self {
            records: response.feed,
            next: response.next.filter(|url| !url.is_empty()),
        }
    }
}

/// Access/refresh token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Token response body; both fields may be missing or null
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// The token pair, if an access token was issued
    pub fn into_pair(self) -> Option<TokenPair> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(TokenPair {
            access_token,
            refresh_token: self.refresh_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QrTriggerResponse {
    session_token: String,
}

/// Feed operations used by the sync engine
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// URL of the first feed page
    fn feed_url(&self) -> String;

    /// Fetch one feed page
    async fn fetch_page(&self, url: &str, access_token: &str) -> Result<FeedPage, ApiError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// HTTP client for the Matter API
#[derive(Debug, Clone)]
pub struct MatterClient {
    client: Client,
    host: String,
}

impl MatterClient {
    /// Create a client for the default API host
    pub fn new() -> Result<Self, ApiError> {
        Self::with_host(MATTER_API_HOST)
    }

    /// Create a client for a specific API host (no trailing slash needed)
    pub fn with_host(host: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("matter-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.host, path.trim_matches('/'))
    }

    /// Start device pairing; returns the session token to show to the user
    pub async fn qr_login_trigger(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.endpoint("qr_login/trigger"))
            .json(&serde_json::json!({ "client_type": CLIENT_TYPE }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: QrTriggerResponse = response.json().await?;
        Ok(body.session_token)
    }

    /// Poll pairing once; `None` until the user confirms on their phone
    pub async fn qr_login_exchange(&self, session_token: &str) -> Result<Option<TokenPair>, ApiError> {
        let response = self
            .client
            .post(self.endpoint("qr_login/exchange"))
            .json(&serde_json::json!({ "session_token": session_token }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: TokenResponse = response.json().await?;
        Ok(body.into_pair())
    }
}

#[async_trait]
impl FeedApi for MatterClient {
    fn feed_url(&self) -> String {
        self.endpoint("library_items/highlights_feed")
    }

    async fn fetch_page(&self, url: &str, access_token: &str) -> Result<FeedPage, ApiError> {
        debug!("Fetching feed page {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: FeedResponse = response.json().await?;
        Ok(body.into())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        debug!("Exchanging refresh token");
        let response = self
            .client
            .post(self.endpoint("token/refresh"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: TokenResponse = response.json().await?;
        body.into_pair()
            .ok_or_else(|| ApiError::Auth("refresh did not return an access token".to_string()))
    }
}

/// Map a non-success response to the matching error
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

fn classify_status(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::Auth(format!("server responded {}", status.as_u16()))
        }
        _ => ApiError::Request {
            status: status.as_u16(),
            body,
        },
    }
}
