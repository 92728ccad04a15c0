//! App-level options shared by every service.

use std::time::Duration;

use serde::Deserialize;

use crate::core::http::DEFAULT_TIMEOUT;

const FIREBASE_CONFIG_VAR: &str = "FIREBASE_CONFIG";
const PROJECT_ID_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Options for a [`FirebaseApp`](crate::FirebaseApp).
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Overrides the project named by the service account key.
    pub project_id: Option<String>,
    /// Realtime Database URL, e.g. `https://my-project.firebaseio.com`.
    pub database_url: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Transient transport retries (connection errors, 5xx). Zero disables retrying.
    pub max_transport_retries: u32,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            database_url: None,
            request_timeout: DEFAULT_TIMEOUT,
            max_transport_retries: 0,
        }
    }
}

/// The subset of the `FIREBASE_CONFIG` document this crate understands.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseConfig {
    project_id: Option<String>,
    #[serde(rename = "databaseURL")]
    database_url: Option<String>,
}

impl AppOptions {
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    /// Parses a `FIREBASE_CONFIG` JSON document (`projectId`, `databaseURL`).
    pub fn from_firebase_config(json: &str) -> Result<Self, serde_json::Error> {
        let config: FirebaseConfig = serde_json::from_str(json)?;
        Ok(Self {
            project_id: config.project_id,
            database_url: config.database_url,
            ..Default::default()
        })
    }

    /// Reads `FIREBASE_CONFIG`, which holds either inline JSON or a path to a JSON file.
    ///
    /// Returns the defaults when the variable is unset or unreadable.
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var(FIREBASE_CONFIG_VAR) else {
            return Self::default();
        };

        let json = if value.trim_start().starts_with('{') {
            value
        } else {
            match std::fs::read_to_string(&value) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!(
                        path = %value,
                        error = %e,
                        "failed to read FIREBASE_CONFIG file"
                    );
                    return Self::default();
                }
            }
        };

        Self::from_firebase_config(&json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to parse FIREBASE_CONFIG");
            Self::default()
        })
    }
}

/// Resolves the project ID: explicit option, then the key, then the environment.
pub(crate) fn resolve_project_id(
    options: &AppOptions,
    key_project_id: Option<&str>,
) -> Option<String> {
    options
        .project_id
        .as_deref()
        .filter(|p| !p.is_empty())
        .or(key_project_id.filter(|p| !p.is_empty()))
        .map(str::to_string)
        .or_else(|| {
            PROJECT_ID_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|p| !p.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_firebase_config() {
        let options = AppOptions::from_firebase_config(
            r#"{
                "projectId": "test-project",
                "databaseURL": "https://test-project.firebaseio.com",
                "storageBucket": "b"
            }"#,
        )
        .unwrap();
        assert_eq!(options.project_id.as_deref(), Some("test-project"));
        assert_eq!(options.database_url.as_deref(), Some("https://test-project.firebaseio.com"));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
        assert_eq!(options.max_transport_retries, 0);

        assert!(AppOptions::from_firebase_config("not json").is_err());
    }

    #[test]
    fn test_resolve_project_id_prefers_options() {
        let options = AppOptions::default().project_id("from-options");
        assert_eq!(
            resolve_project_id(&options, Some("from-key")).as_deref(),
            Some("from-options")
        );
        assert_eq!(
            resolve_project_id(&AppOptions::default(), Some("from-key")).as_deref(),
            Some("from-key")
        );
    }

    #[test]
    fn test_resolve_project_id_skips_empty_option() {
        let options = AppOptions::default().project_id("");
        assert_eq!(
            resolve_project_id(&options, Some("from-key")).as_deref(),
            Some("from-key")
        );
    }
}
