//! Realtime Database security rules.
//!
//! The rules document is exchanged as raw text: it may contain comments and is not guaranteed
//! to be valid JSON.

use std::time::Duration;

use reqwest::Method;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use crate::core::error::{ErrorCode, ProjectManagementError, StatusErrorMap};
use crate::core::http::{HandlerConfig, RequestExecutor};

const RULES_PATH: &str = ".settings/rules.json";

pub(crate) fn status_errors() -> StatusErrorMap {
    StatusErrorMap::default().with(423, ErrorCode::FailedPrecondition)
}

/// Reads and writes the rules document of one Realtime Database instance.
#[derive(Clone)]
pub(crate) struct DatabaseRules {
    executor: RequestExecutor,
}

impl DatabaseRules {
    /// Fails with `invalid-argument` unless `database_url` is an absolute http(s) URL.
    pub(crate) fn new(
        client: ClientWithMiddleware,
        database_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProjectManagementError> {
        let database_url = database_url.filter(|u| !u.is_empty()).ok_or_else(|| {
            ProjectManagementError::invalid_argument(
                "Can't determine Firebase Database URL. Set the database URL as an app option \
                 or in the FIREBASE_CONFIG environment variable.",
            )
        })?;

        let url = Url::parse(database_url).map_err(|e| {
            ProjectManagementError::invalid_argument(format!(
                "Invalid Firebase Database URL \"{}\": {}.",
                database_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ProjectManagementError::invalid_argument(format!(
                "Invalid Firebase Database URL \"{}\": expected an http(s) URL.",
                database_url
            )));
        }

        let config = HandlerConfig::new(database_url.trim_end_matches('/'))
            .timeout(timeout)
            .status_errors(status_errors());
        Ok(Self {
            executor: RequestExecutor::new(client, config),
        })
    }

    pub(crate) async fn get_rules(&self) -> Result<String, ProjectManagementError> {
        self.executor.invoke_text(Method::GET, RULES_PATH, None).await
    }

    pub(crate) async fn set_rules(&self, source: &str) -> Result<(), ProjectManagementError> {
        self.executor
            .invoke_text(Method::PUT, RULES_PATH, Some(source.to_string()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;

    fn database_rules(url: Option<&str>) -> Result<DatabaseRules, ProjectManagementError> {
        let client = ClientBuilder::new(Client::new()).build();
        DatabaseRules::new(client, url, Duration::from_secs(10))
    }

    #[test]
    fn test_requires_database_url() {
        for url in [None, Some(""), Some("not a url"), Some("ftp://db.example.com")] {
            let err = database_rules(url).err().unwrap();
            assert_eq!(err.code(), ErrorCode::InvalidArgument, "{:?}", url);
        }
    }

    #[tokio::test]
    async fn test_get_rules_returns_raw_text() {
        let server = MockServer::start_async().await;
        let source = "{\n  // comments are allowed\n  \"rules\": { \".read\": true }\n}";
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/.settings/rules.json");
                then.status(200).body(source);
            })
            .await;

        let rules = database_rules(Some(&server.url("/"))).unwrap();
        assert_eq!(rules.get_rules().await.unwrap(), source);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_rules_puts_raw_text() {
        let server = MockServer::start_async().await;
        let source = "{ \"rules\": {} } // trailing";
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/.settings/rules.json").body(source);
                then.status(200).body("{\"status\":\"ok\"}");
            })
            .await;

        let rules = database_rules(Some(&server.base_url())).unwrap();
        rules.set_rules(source).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_locked_rules_are_failed_precondition() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/.settings/rules.json");
                then.status(423).body("{\"error\":\"locked\"}");
            })
            .await;

        let rules = database_rules(Some(&server.base_url())).unwrap();
        let err = rules.set_rules("{}").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        assert!(err.to_string().contains("Status code: 423"));
    }
}
