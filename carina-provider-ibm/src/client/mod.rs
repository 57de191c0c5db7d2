//! IBM Cloud REST client
//!
//! One `ApiClient` per service base URL; all of them share an HTTP
//! connection pool and the IAM token cache.

pub mod cd_toolchain;
pub mod event_notifications;
pub mod iam;
pub mod scc;
pub mod vpc;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::IbmConfig;
use crate::error::{IbmError, Result};

pub use cd_toolchain::CdToolchainClient;
pub use event_notifications::EventNotificationsClient;
pub use iam::IamAuthenticator;
pub use scc::SccClient;
pub use vpc::VpcClient;

pub const MERGE_PATCH: &str = "application/merge-patch+json";

/// Authenticated JSON client for one service
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<IamAuthenticator>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        auth: Arc<IamAuthenticator>,
        config: &IbmConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let body = self.send(Method::GET, path, query, None::<&()>, None).await?;
        parse_body(&body)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = self.send(Method::POST, path, &[], Some(body), None).await?;
        parse_body(&body)
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        content_type: Option<&str>,
    ) -> Result<T> {
        let body = self
            .send(Method::PATCH, path, &[], Some(body), content_type)
            .await?;
        parse_body(&body)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, &[], None::<&()>, None)
            .await
            .map(|_| ())
    }

    /// Issue a request, retrying throttled and server errors with linear backoff
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let token = self.auth.token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token)
                .header(reqwest::header::ACCEPT, "application/json");
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        content_type.unwrap_or("application/json"),
                    )
                    .body(serde_json::to_vec(body)?);
            }

            debug!("{} {}", method, url);
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                return Ok(text);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(IbmError::NotFound(format!("{} {}", method, path)));
            }
            if is_retryable(status) && attempt < self.max_retries {
                attempt += 1;
                let delay = self.retry_delay * attempt;
                warn!(
                    "{} {} returned {}, retrying in {:?} ({}/{})",
                    method, path, status, delay, attempt, self.max_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(IbmError::Http {
                status: status.as_u16(),
                message: error_message(&text).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                }),
            });
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Empty bodies (204) deserialize as JSON null
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    if body.trim().is_empty() {
        Ok(serde_json::from_value(serde_json::Value::Null)?)
    } else {
        Ok(serde_json::from_str(body)?)
    }
}

/// Extract the message from an IBM Cloud error body
///
/// Services report either `{"errors": [{"message": ..}]}` or `{"message": ..}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("errors")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("message"))
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Clients for every service the provider talks to
pub struct IbmClient {
    pub event_notifications: EventNotificationsClient,
    pub toolchain: CdToolchainClient,
    pub scc: SccClient,
    pub vpc: VpcClient,
}

impl IbmClient {
    pub fn new(config: &IbmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("carina-provider-ibm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let auth = Arc::new(IamAuthenticator::new(
            http.clone(),
            &config.iam_url,
            config.api_key.clone(),
        ));
        let api = |base_url: String| ApiClient::new(http.clone(), base_url, auth.clone(), config);

        Ok(Self {
            event_notifications: EventNotificationsClient::new(api(
                config.event_notifications_url(),
            )),
            toolchain: CdToolchainClient::new(api(config.toolchain_url())),
            scc: SccClient::new(api(config.scc_url())),
            vpc: VpcClient::new(api(config.vpc_url())),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Mock server that already answers IAM token requests
    pub async fn mock_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "test-token",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;
        server
    }

    pub fn api_client(server: &MockServer) -> ApiClient {
        let config = IbmConfig::for_endpoint("key", &server.uri());
        let http = reqwest::Client::new();
        let auth = Arc::new(IamAuthenticator::new(http.clone(), &server.uri(), "key"));
        ApiClient::new(http, server.uri(), auth, &config)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::testing::{api_client, mock_server};
    use super::*;

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/things/1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .mount(&server)
            .await;

        let value: serde_json::Value = api_client(&server).get("/things/1", &[]).await.unwrap();
        assert_eq!(value["id"], "1");
    }

    #[tokio::test]
    async fn not_found_is_distinct() {
        let server = mock_server().await;
        let err = api_client(&server)
            .get::<serde_json::Value>("/missing", &[])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn error_message_comes_from_body() {
        let server = mock_server().await;
        Mock::given(method("POST"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": [{"code": "invalid", "message": "name is too long"}],
                "status_code": 400
            })))
            .mount(&server)
            .await;

        let err = api_client(&server)
            .post::<_, serde_json::Value>("/things", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            IbmError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "name is too long");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let mut client = api_client(&server);
        client.max_retries = 2;
        let value: serde_json::Value = client.get("/flaky", &[]).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let server = mock_server().await;
        Mock::given(method("DELETE"))
            .and(path("/things/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        api_client(&server).delete("/things/1").await.unwrap();
    }

    #[test]
    fn error_message_falls_back_to_top_level() {
        assert_eq!(
            error_message(r#"{"message": "quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(error_message("not json"), None);
    }
}
