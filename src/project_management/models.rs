use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::ProjectManagementError;

/// Platform of a Firebase app. Platforms this crate does not model (e.g. web) are
/// `PlatformUnknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppPlatform {
    PlatformUnknown,
    Ios,
    Android,
}

impl AppPlatform {
    pub(crate) fn from_api(platform: Option<&str>) -> Self {
        match platform {
            Some("ANDROID") => AppPlatform::Android,
            Some("IOS") => AppPlatform::Ios,
            _ => AppPlatform::PlatformUnknown,
        }
    }
}

/// Metadata common to every app in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub app_id: String,
    pub display_name: Option<String>,
    pub platform: AppPlatform,
    pub project_id: String,
    pub resource_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidAppMetadata {
    pub app_id: String,
    pub display_name: Option<String>,
    pub project_id: String,
    pub resource_name: String,
    pub package_name: String,
}

impl AndroidAppMetadata {
    pub fn platform(&self) -> AppPlatform {
        AppPlatform::Android
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosAppMetadata {
    pub app_id: String,
    pub display_name: Option<String>,
    pub project_id: String,
    pub resource_name: String,
    pub bundle_id: String,
}

impl IosAppMetadata {
    pub fn platform(&self) -> AppPlatform {
        AppPlatform::Ios
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertType {
    Sha1,
    Sha256,
}

impl CertType {
    pub(crate) fn as_api(&self) -> &'static str {
        match self {
            CertType::Sha1 => "SHA_1",
            CertType::Sha256 => "SHA_256",
        }
    }
}

impl fmt::Display for CertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertType::Sha1 => f.write_str("sha1"),
            CertType::Sha256 => f.write_str("sha256"),
        }
    }
}

/// A SHA-1 or SHA-256 certificate fingerprint registered with an Android app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaCertificate {
    sha_hash: String,
    cert_type: CertType,
    resource_name: Option<String>,
}

impl ShaCertificate {
    /// Builds a certificate from a hex fingerprint; the type is derived from its length
    /// (40 digits for SHA-1, 64 for SHA-256).
    pub fn new(sha_hash: impl Into<String>) -> Result<Self, ProjectManagementError> {
        let sha_hash = sha_hash.into();
        let cert_type = match (sha_hash.len(), hex::decode(&sha_hash)) {
            (40, Ok(_)) => CertType::Sha1,
            (64, Ok(_)) => CertType::Sha256,
            _ => {
                return Err(ProjectManagementError::invalid_argument(
                    "shaHash must be either a sha256 hash or a sha1 hash.",
                ))
            }
        };
        Ok(Self {
            sha_hash,
            cert_type,
            resource_name: None,
        })
    }

    pub(crate) fn with_resource_name(
        sha_hash: impl Into<String>,
        resource_name: String,
    ) -> Result<Self, ProjectManagementError> {
        let mut cert = Self::new(sha_hash)?;
        cert.resource_name = Some(resource_name);
        Ok(cert)
    }

    pub fn sha_hash(&self) -> &str {
        &self.sha_hash
    }

    pub fn cert_type(&self) -> CertType {
        self.cert_type
    }

    /// Backend resource name; only present on certificates returned by the backend.
    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }
}

/// Services whose security rules can be read and published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulesService {
    Firestore,
    Storage,
    Database,
}

impl RulesService {
    pub(crate) fn parse(service: &str, operation: &str) -> Result<Self, ProjectManagementError> {
        match service {
            "firestore" => Ok(RulesService::Firestore),
            "storage" => Ok(RulesService::Storage),
            "database" => Ok(RulesService::Database),
            _ => Err(ProjectManagementError::invalid_argument(format!(
                "The service name passed to {}() must be one of \"firestore\", \"storage\" or \
                 \"database\".",
                operation
            ))),
        }
    }

    /// Release slot for services published through the Rules API.
    pub(crate) fn release_name(&self) -> Option<&'static str> {
        match self {
            RulesService::Firestore => Some("cloud.firestore"),
            RulesService::Storage => Some("firebase.storage"),
            RulesService::Database => None,
        }
    }

    pub(crate) fn rules_file_name(&self) -> &'static str {
        match self {
            RulesService::Firestore => "firestore.rules",
            RulesService::Storage => "storage.rules",
            RulesService::Database => "database.rules.json",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListAppsResponse {
    #[serde(default)]
    pub apps: Option<Vec<AppJson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppJson {
    pub app_id: Option<String>,
    pub display_name: Option<String>,
    pub platform: Option<String>,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub package_name: Option<String>,
    pub bundle_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShaCertificatesResponse {
    #[serde(default)]
    pub certificates: Option<Vec<ShaCertificateJson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShaCertificateJson {
    pub name: Option<String>,
    pub sha_hash: Option<String>,
    pub cert_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppConfigResponse {
    pub config_file_contents: Option<Value>,
}
