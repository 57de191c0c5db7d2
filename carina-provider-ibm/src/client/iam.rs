//! IAM API key to bearer token exchange

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{IbmError, Result};

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix timestamp (seconds)
    expiration: Option<i64>,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges an API key for bearer tokens and caches them until shortly before expiry
pub struct IamAuthenticator {
    http: reqwest::Client,
    token_url: String,
    api_key: String,
    cached: Mutex<Option<CachedToken>>,
}

impl IamAuthenticator {
    pub fn new(http: reqwest::Client, iam_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            token_url: format!("{}/identity/token", iam_url.trim_end_matches('/')),
            api_key: api_key.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, requesting a new one if needed
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!("requesting IAM token from {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("errorMessage")
                        .or_else(|| v.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(IbmError::Auth(format!("{}: {}", status.as_u16(), message)));
        }

        let token: TokenResponse = response.json().await?;
        let now = Utc::now();
        let expires_at = match (token.expiration, token.expires_in) {
            (Some(ts), _) => DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| IbmError::Auth(format!("invalid token expiration {}", ts)))?,
            (None, Some(secs)) => now + Duration::seconds(secs),
            (None, None) => now,
        };

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}
