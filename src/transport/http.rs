//! HTTP client for the upstream employee API
//!
//! One call = one attempt. Retrying is the caller's job; this layer turns a
//! response into either the decoded `data` payload or a classified error.

use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::interceptor::ObservabilityInterceptor;
use crate::config::{ObservabilityConfig, UpstreamConfig};
use crate::failsafe::{OutcomeKind, classify};
use crate::model::Envelope;
use crate::{Error, Result};

/// Client bound to the upstream base URL
pub struct UpstreamClient {
    /// HTTP client (timeouts applied once here)
    client: Client,
    /// Base URL, no trailing slash
    base_url: String,
    /// Extra headers for every request
    headers: HeaderMap,
    /// Request/response logging
    interceptor: ObservabilityInterceptor,
}

impl UpstreamClient {
    /// Create a new upstream client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a configured header is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig, observability: &ObservabilityConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_str(key)
                .map_err(|e| Error::Config(format!("Invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers,
            interceptor: ObservabilityInterceptor::new(observability.log_bodies),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}`; an empty `path` addresses the collection itself
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    /// `POST {base}{path}` with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// `DELETE {base}{path}` with a JSON body
    pub async fn delete<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(Method::DELETE, path, Some(body)).await
    }

    /// Send one request and unwrap the `{ "data": ... }` envelope
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let target = format!("{method} {url}");

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let request = builder
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build request for {target}: {e}")))?;

        let response = self.interceptor.execute(&self.client, request).await?;
        if let Some(err) = status_error(response.status(), response.headers(), &target) {
            return Err(err);
        }

        // Reading the body can still time out or be reset; that is a
        // transport failure, not a malformed payload
        let body = response.bytes().await.map_err(|e| {
            warn!(target = %target, error = %e, timeout = e.is_timeout(), "Failed to read upstream response body");
            Error::Transport(format!("{target}: {e}"))
        })?;

        // 200 on create is expected; this upstream never sends 201
        let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
            warn!(target = %target, error = %e, "Unexpected upstream response body");
            Error::Decode(format!("{target}: {e}"))
        })?;
        Ok(envelope.data)
    }
}

/// Error for a non-success status, `None` for 2xx
fn status_error(status: StatusCode, headers: &HeaderMap, target: &str) -> Option<Error> {
    match classify(status, headers) {
        OutcomeKind::Success => None,
        OutcomeKind::Retryable { retry_after } => Some(Error::RetryableUpstream {
            status: status.as_u16(),
            target: target.to_string(),
            retry_after,
        }),
        OutcomeKind::Terminal => Some(Error::TerminalUpstream {
            status: status.as_u16(),
            target: target.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UpstreamClient {
        let config = UpstreamConfig {
            base_url: server.uri(),
            ..UpstreamConfig::default()
        };
        UpstreamClient::new(&config, &ObservabilityConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unwraps_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2, 3], "status": "ok"})),
            )
            .mount(&server)
            .await;

        let data: Vec<u32> = client_for(&server).get("/").await.unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rate_limit_carries_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .mount(&server)
            .await;

        let err = client_for(&server).get::<Vec<u32>>("/").await.unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get::<u32>("/missing").await.unwrap_err();
        assert!(err.is_terminal());
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_bad_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).get::<u32>("/").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_configured_headers_and_json_body_sent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/"))
            .and(header("x-tenant", "acme"))
            .and(body_json(json!({"name": "Jill"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = std::collections::HashMap::new();
        headers.insert("x-tenant".to_string(), "acme".to_string());
        let config = UpstreamConfig {
            base_url: format!("{}/", server.uri()),
            headers,
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(&config, &ObservabilityConfig::default()).unwrap();

        let deleted: bool = client.delete("", &json!({"name": "Jill"})).await.unwrap();
        assert!(deleted);
    }

    #[test]
    fn test_status_error_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "GET http://upstream").unwrap();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(status_error(StatusCode::OK, &headers, "GET http://upstream").is_none());
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "GET http://upstream"),
            Some(Error::TerminalUpstream { status: 404, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header_sets_exact_wait() {
        use crate::config::{BackoffConfig, RetryConfig};
        use crate::failsafe::RetryExecutor;
        use std::sync::atomic::{AtomicU32, Ordering};

        let executor = RetryExecutor::new(&RetryConfig {
            enabled: true,
            max_attempts: 3,
            backoff: BackoffConfig::Fixed {
                interval: Duration::from_millis(10),
            },
        });
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        let calls = AtomicU32::new(0);

        let start = tokio::time::Instant::now();
        let result = executor
            .execute("list", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let outcome = if n == 0 {
                    status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "GET http://upstream")
                } else {
                    None
                };
                async move { outcome.map_or(Ok(n), Err) }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_retry_after_uses_policy_delay() {
        use crate::config::{BackoffConfig, RetryConfig};
        use crate::failsafe::RetryExecutor;
        use std::sync::atomic::{AtomicU32, Ordering};

        let executor = RetryExecutor::new(&RetryConfig {
            enabled: true,
            max_attempts: 3,
            backoff: BackoffConfig::Fixed {
                interval: Duration::from_millis(10),
            },
        });
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        let calls = AtomicU32::new(0);

        let start = tokio::time::Instant::now();
        let result = executor
            .execute("list", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let outcome = if n == 0 {
                    status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "GET http://upstream")
                } else {
                    None
                };
                async move { outcome.map_or(Ok(n), Err) }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut headers = std::collections::HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let config = UpstreamConfig {
            headers,
            ..UpstreamConfig::default()
        };
        assert!(matches!(
            UpstreamClient::new(&config, &ObservabilityConfig::default()),
            Err(Error::Config(_))
        ));
    }
}
