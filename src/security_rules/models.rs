use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::ProjectManagementError;
use crate::core::resource_name::{self, Collection};

/// A single rules source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
    pub name: String,
    pub content: String,
}

/// Metadata of an immutable ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Short ruleset id (UUID).
    pub id: String,
    pub create_time: DateTime<Utc>,
}

/// A ruleset together with its source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesetWithFiles {
    pub id: String,
    pub create_time: DateTime<Utc>,
    pub files: Vec<RulesFile>,
}

/// A named pointer from a slot such as `cloud.firestore` to one ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesRelease {
    pub name: String,
    pub ruleset_id: String,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesetList {
    pub rulesets: Vec<Ruleset>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseList {
    pub releases: Vec<RulesRelease>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RulesetResponse {
    pub name: String,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<RulesetSource>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RulesetSource {
    #[serde(default)]
    pub files: Vec<RulesFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReleaseResponse {
    pub name: String,
    pub ruleset_name: String,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListRulesetsResponse {
    #[serde(default)]
    pub rulesets: Vec<RulesetResponse>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListReleasesResponse {
    #[serde(default)]
    pub releases: Vec<ReleaseResponse>,
    pub next_page_token: Option<String>,
}

impl RulesetResponse {
    pub(crate) fn into_ruleset(self) -> Result<Ruleset, ProjectManagementError> {
        Ok(Ruleset {
            id: resource_name::shorten(&self.name, Collection::Rulesets)?,
            create_time: self.create_time,
        })
    }

    pub(crate) fn into_ruleset_with_files(
        self,
    ) -> Result<RulesetWithFiles, ProjectManagementError> {
        Ok(RulesetWithFiles {
            id: resource_name::shorten(&self.name, Collection::Rulesets)?,
            create_time: self.create_time,
            files: self.source.unwrap_or_default().files,
        })
    }
}

impl ReleaseResponse {
    pub(crate) fn into_release(self) -> Result<RulesRelease, ProjectManagementError> {
        Ok(RulesRelease {
            name: resource_name::shorten(&self.name, Collection::Releases)?,
            ruleset_id: resource_name::shorten(&self.ruleset_name, Collection::Rulesets)?,
            create_time: self.create_time,
            update_time: self.update_time,
        })
    }
}
