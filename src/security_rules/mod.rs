//! Firebase Security Rules management.
//!
//! Rulesets are immutable bundles of rules source files. A release is a named slot
//! (`cloud.firestore`, `firebase.storage`) pointing at exactly one ruleset; publishing new rules
//! means creating a ruleset and repointing the release.
//!
//! Names are exchanged in their short form: ruleset UUIDs and release names, never the full
//! `projects/{project}/...` paths.

pub mod models;

use std::time::Duration;

use reqwest::Method;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::core::error::{parse_response, ErrorCode, ProjectManagementError, StatusErrorMap};
use crate::core::http::{ApiVersion, HandlerConfig, RequestExecutor};
use crate::core::resource_name::{self, Collection};
use models::{
    ListReleasesResponse, ListRulesetsResponse, ReleaseList, ReleaseResponse, RulesFile,
    RulesRelease, RulesetList, RulesetResponse, RulesetWithFiles,
};

const RULES_V1_API: &str = "https://firebaserules.googleapis.com/v1";

const MAX_PAGE_SIZE: u32 = 100;

pub(crate) fn status_errors() -> StatusErrorMap {
    StatusErrorMap::default().with(429, ErrorCode::ResourceExhausted)
}

/// Client for the Firebase Rules API.
#[derive(Clone)]
pub struct SecurityRules {
    executor: RequestExecutor,
    project_id: Option<String>,
}

impl SecurityRules {
    pub(crate) fn new(
        client: ClientWithMiddleware,
        project_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self::new_with_client(client, RULES_V1_API.to_string(), project_id, timeout)
    }

    /// Creates a client against a custom base URL.
    /// Internal use only, primarily for testing.
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        project_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        let config = HandlerConfig::new(base_url)
            .timeout(timeout)
            .status_errors(status_errors());
        Self {
            executor: RequestExecutor::new(client, config),
            project_id,
        }
    }

    /// The project whose rules this client manages, if one could be determined.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    fn require_project_id(&self) -> Result<&str, ProjectManagementError> {
        self.project_id().ok_or_else(|| {
            ProjectManagementError::new(
                ErrorCode::InvalidProjectId,
                "Failed to determine project ID. Initialize the SDK with service account \
                 credentials or set project ID as an app option. Alternatively, set the \
                 GOOGLE_CLOUD_PROJECT environment variable.",
            )
        })
    }

    fn resource(
        &self,
        collection: Collection,
        short_id: &str,
    ) -> Result<String, ProjectManagementError> {
        let what = match collection {
            Collection::Releases => "Release name",
            Collection::Rulesets => "Ruleset name",
        };
        if short_id.is_empty() {
            return Err(ProjectManagementError::invalid_argument(format!(
                "{} must be a non-empty string.",
                what
            )));
        }
        if short_id.contains('/') {
            return Err(ProjectManagementError::invalid_argument(format!(
                "{} must not contain any \"/\" characters.",
                what
            )));
        }
        Ok(resource_name::build(
            self.require_project_id()?,
            collection,
            short_id,
        ))
    }

    fn list_path(
        &self,
        collection: Collection,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<String, ProjectManagementError> {
        let page_size = page_size.unwrap_or(MAX_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ProjectManagementError::invalid_argument(format!(
                "Page size must be between 1 and {}.",
                MAX_PAGE_SIZE
            )));
        }

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("pageSize", &page_size.to_string());
        if let Some(token) = page_token {
            if token.is_empty() {
                return Err(ProjectManagementError::invalid_argument(
                    "Next page token must be a non-empty string.",
                ));
            }
            query.append_pair("pageToken", token);
        }

        Ok(format!(
            "projects/{}/{}?{}",
            self.require_project_id()?,
            collection.as_str(),
            query.finish()
        ))
    }

    async fn get(&self, path: &str) -> Result<Value, ProjectManagementError> {
        self.executor
            .invoke_json(Method::GET, path, None, ApiVersion::Stable)
            .await
    }

    /// Fetches a ruleset and its source files.
    pub async fn get_ruleset(
        &self,
        ruleset_id: &str,
    ) -> Result<RulesetWithFiles, ProjectManagementError> {
        let path = self.resource(Collection::Rulesets, ruleset_id)?;
        let value = self.get(&path).await?;
        parse_response::<RulesetResponse>(&value, "getRuleset()'s response")?
            .into_ruleset_with_files()
    }

    /// Creates a new immutable ruleset from `files`.
    pub async fn create_ruleset(
        &self,
        files: Vec<RulesFile>,
    ) -> Result<RulesetWithFiles, ProjectManagementError> {
        if files.is_empty() {
            return Err(ProjectManagementError::invalid_argument(
                "A ruleset must contain at least one rules file.",
            ));
        }
        let path = format!("projects/{}/rulesets", self.require_project_id()?);
        let body = json!({ "source": { "files": files } });
        let value = self
            .executor
            .invoke_json(Method::POST, &path, Some(body), ApiVersion::Stable)
            .await?;
        parse_response::<RulesetResponse>(&value, "createRuleset()'s response")?
            .into_ruleset_with_files()
    }

    pub async fn delete_ruleset(&self, ruleset_id: &str) -> Result<(), ProjectManagementError> {
        let path = self.resource(Collection::Rulesets, ruleset_id)?;
        self.executor
            .invoke_json(Method::DELETE, &path, None, ApiVersion::Stable)
            .await?;
        Ok(())
    }

    /// Lists ruleset metadata, `page_size` defaulting to (and capped at) 100.
    pub async fn list_rulesets(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<RulesetList, ProjectManagementError> {
        let path = self.list_path(Collection::Rulesets, page_size, page_token)?;
        let value = self.get(&path).await?;
        let response: ListRulesetsResponse = parse_response(&value, "listRulesets()'s response")?;
        Ok(RulesetList {
            rulesets: response
                .rulesets
                .into_iter()
                .map(RulesetResponse::into_ruleset)
                .collect::<Result<_, _>>()?,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    pub async fn get_release(&self, name: &str) -> Result<RulesRelease, ProjectManagementError> {
        let path = self.resource(Collection::Releases, name)?;
        let value = self.get(&path).await?;
        parse_response::<ReleaseResponse>(&value, "getRelease()'s response")?.into_release()
    }

    /// Creates release `name` pointing at `ruleset_id`. Fails with `already-exists` if the slot
    /// is taken.
    pub async fn create_release(
        &self,
        name: &str,
        ruleset_id: &str,
    ) -> Result<RulesRelease, ProjectManagementError> {
        let release_name = self.resource(Collection::Releases, name)?;
        let ruleset_name = self.resource(Collection::Rulesets, ruleset_id)?;
        let path = format!("projects/{}/releases", self.require_project_id()?);
        let body = json!({ "name": release_name, "rulesetName": ruleset_name });
        let value = self
            .executor
            .invoke_json(Method::POST, &path, Some(body), ApiVersion::Stable)
            .await?;
        parse_response::<ReleaseResponse>(&value, "createRelease()'s response")?.into_release()
    }

    /// Repoints existing release `name` at `ruleset_id`.
    pub async fn update_release(
        &self,
        name: &str,
        ruleset_id: &str,
    ) -> Result<RulesRelease, ProjectManagementError> {
        let release_name = self.resource(Collection::Releases, name)?;
        let ruleset_name = self.resource(Collection::Rulesets, ruleset_id)?;
        let body = json!({ "release": { "name": release_name, "rulesetName": ruleset_name } });
        let value = self
            .executor
            .invoke_json(Method::PATCH, &release_name, Some(body), ApiVersion::Stable)
            .await?;
        parse_response::<ReleaseResponse>(&value, "updateRelease()'s response")?.into_release()
    }

    pub async fn delete_release(&self, name: &str) -> Result<(), ProjectManagementError> {
        let path = self.resource(Collection::Releases, name)?;
        self.executor
            .invoke_json(Method::DELETE, &path, None, ApiVersion::Stable)
            .await?;
        Ok(())
    }

    pub async fn list_releases(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ReleaseList, ProjectManagementError> {
        let path = self.list_path(Collection::Releases, page_size, page_token)?;
        let value = self.get(&path).await?;
        let response: ListReleasesResponse = parse_response(&value, "listReleases()'s response")?;
        Ok(ReleaseList {
            releases: response
                .releases
                .into_iter()
                .map(ReleaseResponse::into_release)
                .collect::<Result<_, _>>()?,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests;
