//! Request envelope shared by the app-management, rules and database-rules handlers.
//!
//! A single [`RequestExecutor`] is configured per backend with a [`HandlerConfig`]; backend policy
//! (URLs, headers, status mapping, timeout) is data rather than code.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde_json::Value;
use tracing::debug;

use crate::core::error::{ProjectManagementError, StatusErrorMap};
use crate::core::middleware::AuthMiddleware;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_VERSION_HEADER: &str = "x-client-version";

/// The client identification sent with every request.
pub fn client_version() -> String {
    format!("Rust/Admin/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds the authenticated client shared by every handler of an app.
///
/// Transient transport failures are retried only when `max_transport_retries` is non-zero.
pub(crate) fn build_client(
    middleware: AuthMiddleware,
    max_transport_retries: u32,
) -> ClientWithMiddleware {
    let mut builder = ClientBuilder::new(Client::new());
    if max_transport_retries > 0 {
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(max_transport_retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
    }
    builder.with(middleware).build()
}

/// Backend-specific policy for a [`RequestExecutor`].
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub base_url: String,
    /// Second API surface (e.g. `v1beta1`), selected per call.
    pub alternate_base_url: Option<String>,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub status_errors: StatusErrorMap,
}

impl HandlerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&client_version()) {
            headers.insert(HeaderName::from_static(CLIENT_VERSION_HEADER), value);
        }
        Self {
            base_url: base_url.into(),
            alternate_base_url: None,
            headers,
            timeout: DEFAULT_TIMEOUT,
            status_errors: StatusErrorMap::default(),
        }
    }

    pub fn alternate_base_url(mut self, url: impl Into<String>) -> Self {
        self.alternate_base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn status_errors(mut self, status_errors: StatusErrorMap) -> Self {
        self.status_errors = status_errors;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    Stable,
    Alternate,
}

/// What the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub api_version: ApiVersion,
    pub format: ResponseFormat,
}

impl RequestOptions {
    pub fn json(api_version: ApiVersion) -> Self {
        Self {
            api_version,
            format: ResponseFormat::Json,
        }
    }

    pub fn text() -> Self {
        Self {
            api_version: ApiVersion::Stable,
            format: ResponseFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Text(String),
}

/// A successful response, tagged by how it was read.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

impl ApiResponse {
    pub fn into_json(self) -> Result<Value, ProjectManagementError> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Text(_) => Err(ProjectManagementError::internal(
                "Expected a JSON response but the request was read as text.",
            )),
        }
    }

    pub fn into_text(self) -> Result<String, ProjectManagementError> {
        match self {
            ApiResponse::Text(text) => Ok(text),
            ApiResponse::Json(_) => Err(ProjectManagementError::internal(
                "Expected a text response but the request was read as JSON.",
            )),
        }
    }
}

/// Sends authenticated requests to one backend. Does not retry.
#[derive(Clone)]
pub struct RequestExecutor {
    client: ClientWithMiddleware,
    config: Arc<HandlerConfig>,
}

impl RequestExecutor {
    pub fn new(client: ClientWithMiddleware, config: HandlerConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    fn url(&self, path: &str, version: ApiVersion) -> String {
        let base = match version {
            ApiVersion::Alternate => self
                .config
                .alternate_base_url
                .as_deref()
                .unwrap_or(&self.config.base_url),
            ApiVersion::Stable => &self.config.base_url,
        };
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub async fn invoke(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse, ProjectManagementError> {
        let url = self.url(path, options.api_version);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .headers(self.config.headers.clone())
            .timeout(self.config.timeout);

        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&value).map_err(|e| {
                    ProjectManagementError::internal(format!("Failed to serialize request: {}", e))
                })?),
            RequestBody::Text(text) => req
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text),
        };

        debug!(%method, %url, "sending request");
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, %url, status = status.as_u16(), "received response");

        let errors = &self.config.status_errors;
        if status.as_u16() >= 400 {
            return Err(errors.wrap_http_error(status.as_u16(), &text));
        }

        match options.format {
            ResponseFormat::Text => Ok(ApiResponse::Text(text)),
            ResponseFormat::Json if text.trim().is_empty() => {
                Ok(ApiResponse::Json(Value::Object(Default::default())))
            }
            ResponseFormat::Json => serde_json::from_str(&text)
                .map(ApiResponse::Json)
                .map_err(|_| errors.wrap_http_error(status.as_u16(), &text)),
        }
    }

    pub async fn invoke_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        api_version: ApiVersion,
    ) -> Result<Value, ProjectManagementError> {
        let body = body.map(RequestBody::Json).unwrap_or(RequestBody::Empty);
        self.invoke(method, path, body, RequestOptions::json(api_version))
            .await?
            .into_json()
    }

    pub async fn invoke_text(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<String, ProjectManagementError> {
        let body = body.map(RequestBody::Text).unwrap_or(RequestBody::Empty);
        self.invoke(method, path, body, RequestOptions::text())
            .await?
            .into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;
    use httpmock::prelude::*;
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;
    use serde_json::json;

    fn executor(server: &MockServer) -> RequestExecutor {
        let client = ClientBuilder::new(Client::new()).build();
        let config =
            HandlerConfig::new(server.url("/v1")).alternate_base_url(server.url("/v1beta1"));
        RequestExecutor::new(client, config)
    }

    #[tokio::test]
    async fn test_invoke_json_sends_client_version() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta1/projects/p/things")
                    .header(CLIENT_VERSION_HEADER, client_version())
                    .header("content-type", "application/json")
                    .json_body(json!({ "a": 1 }));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "ok": true }));
            })
            .await;

        let value = executor(&server)
            .invoke_json(
                Method::POST,
                "projects/p/things",
                Some(json!({ "a": 1 })),
                ApiVersion::Alternate,
            )
            .await
            .unwrap();
        assert_eq!(value, json!({ "ok": true }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invoke_json_rejects_non_json_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects/p");
                then.status(200).body("not json");
            })
            .await;

        let err = executor(&server)
            .invoke_json(Method::GET, "projects/p", None, ApiVersion::Stable)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert!(err.to_string().contains("Status code: 200"));
        assert!(err.to_string().contains("not json"));
    }

    #[tokio::test]
    async fn test_invoke_maps_error_statuses() {
        let server = MockServer::start_async().await;
        for (status, code) in [
            (404, ErrorCode::NotFound),
            (409, ErrorCode::AlreadyExists),
            (418, ErrorCode::UnknownError),
        ] {
            let path = format!("/v1/status/{}", status);
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path.as_str());
                    then.status(status).body("{}");
                })
                .await;

            let err = executor(&server)
                .invoke_json(Method::GET, &format!("status/{}", status), None, ApiVersion::Stable)
                .await
                .unwrap_err();
            assert_eq!(err.code(), code);
        }
    }

    #[tokio::test]
    async fn test_invoke_text_returns_raw_body() {
        let server = MockServer::start_async().await;
        let source = "// comment\n{ \"rules\": {} }";
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/v1/.settings/rules.json").body(source);
                then.status(200).body(source);
            })
            .await;

        let text = executor(&server)
            .invoke_text(Method::PUT, ".settings/rules.json", Some(source.to_string()))
            .await
            .unwrap();
        assert_eq!(text, source);
        mock.assert_async().await;
    }

    #[test]
    fn test_api_response_tags() {
        assert!(ApiResponse::Text("x".into()).into_json().is_err());
        assert!(ApiResponse::Json(json!({})).into_text().is_err());
        assert_eq!(ApiResponse::Text("x".into()).into_text().unwrap(), "x");
    }
}
