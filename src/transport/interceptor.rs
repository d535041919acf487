//! Request/response observability for upstream calls
//!
//! Records metadata before dispatch and after completion. The response is
//! handed back untouched, so its body stream is still unread for the caller.
//! Request bodies are only peeked at when they are already buffered.

use std::fmt::Write as _;
use std::time::Instant;

use reqwest::header::HeaderMap;
use reqwest::{Client, Request, Response};
use tracing::{debug, warn};

/// Header values never written to logs
const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Longest request body logged verbatim
const MAX_LOGGED_BODY: usize = 4096;

/// Wraps a single network call with structured log records
#[derive(Debug, Clone, Default)]
pub struct ObservabilityInterceptor {
    log_bodies: bool,
}

impl ObservabilityInterceptor {
    /// Create an interceptor
    #[must_use]
    pub fn new(log_bodies: bool) -> Self {
        Self { log_bodies }
    }

    /// Dispatch `request` on `client`, logging around it
    ///
    /// Logging never changes the outcome: the transport result is returned
    /// as-is.
    pub async fn execute(&self, client: &Client, request: Request) -> reqwest::Result<Response> {
        let method = request.method().clone();
        let target = request.url().clone();

        self.record_request(&request);
        let started = Instant::now();

        match client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(
                    method = %method,
                    target = %target,
                    status = status.as_u16(),
                    headers = %format_headers(response.headers()),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Received upstream response"
                );
                telemetry_metrics::counter!(
                    "upstream_requests_total",
                    "method" => method.to_string(),
                    "status" => status.as_u16().to_string()
                )
                .increment(1);
                Ok(response)
            }
            Err(e) => {
                warn!(
                    method = %method,
                    target = %target,
                    elapsed_ms = started.elapsed().as_millis(),
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    error = %e,
                    "Upstream request failed"
                );
                telemetry_metrics::counter!(
                    "upstream_requests_total",
                    "method" => method.to_string(),
                    "status" => "transport_error"
                )
                .increment(1);
                Err(e)
            }
        }
    }

    fn record_request(&self, request: &Request) {
        debug!(
            method = %request.method(),
            target = %request.url(),
            headers = %format_headers(request.headers()),
            "Sending upstream request"
        );

        if !self.log_bodies {
            return;
        }

        // Streaming bodies have no bytes to peek at; skip rather than drain
        if let Some(bytes) = request.body().and_then(reqwest::Body::as_bytes) {
            let shown = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
            debug!(
                method = %request.method(),
                target = %request.url(),
                size = bytes.len(),
                truncated = bytes.len() > MAX_LOGGED_BODY,
                body = %String::from_utf8_lossy(shown),
                "Upstream request body"
            );
        }
    }
}

/// Render headers as `name: value` pairs with secrets redacted
fn format_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        if !out.is_empty() {
            out.push_str(", ");
        }
        let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
            "<redacted>"
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        // writing to a String cannot fail
        let _ = write!(out, "{name}: {shown}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_format_headers_redacts_secrets() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));

        let rendered = format_headers(&headers);
        assert!(rendered.contains("content-type: application/json"));
        assert!(rendered.contains("authorization: <redacted>"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_format_headers_binary_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-blob", HeaderValue::from_bytes(&[0xfe, 0xff]).unwrap());
        assert_eq!(format_headers(&headers), "x-blob: <binary>");
    }

    #[tokio::test]
    async fn test_response_body_left_readable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let request = client
            .post(server.uri())
            .body("{\"name\":\"x\"}")
            .build()
            .unwrap();

        let response = ObservabilityInterceptor::new(true)
            .execute(&client, request)
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_transport_error_passed_through() {
        let client = Client::new();
        // port 9 (discard) on localhost is not listening in test environments
        let request = client.get("http://127.0.0.1:9/").build().unwrap();
        let result = ObservabilityInterceptor::new(false)
            .execute(&client, request)
            .await;
        assert!(result.is_err());
    }
}
