//! Firebase project management.
//!
//! Lists, creates and configures the Android and iOS apps of a project, and publishes the
//! security rules of its Firestore, Cloud Storage and Realtime Database services.
//!
//! # Publishing rules
//!
//! Firestore and Storage rules are published in two steps: a new ruleset is created, then the
//! service's release is repointed at it. If the release does not exist yet it is created instead.
//! A failure after the ruleset was created leaves an unreferenced ruleset behind.

pub mod models;

mod android_app;
mod ios_app;
mod request_handler;

use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{resolve_project_id, AppOptions};
use crate::core::error::{parse_response, require_field, ErrorCode, ProjectManagementError};
use crate::core::http::build_client;
use crate::core::middleware::AuthMiddleware;
use crate::core::poller::ExponentialBackoffPoller;
use crate::core::resource_name;
use crate::database::DatabaseRules;
use crate::security_rules::models::{
    ReleaseList, RulesFile, RulesRelease, RulesetList, RulesetWithFiles,
};
use crate::security_rules::SecurityRules;
use models::{
    AppConfigResponse, AppJson, AppMetadata, AppPlatform, ListAppsResponse, RulesService,
    ShaCertificate,
};
use request_handler::ProjectManagementRequestHandler;

pub use android_app::AndroidApp;
pub use ios_app::IosApp;

/// Entry point for app management and rules publishing in one Firebase project.
#[derive(Clone)]
pub struct ProjectManagement {
    request_handler: ProjectManagementRequestHandler,
    security_rules: SecurityRules,
    client: ClientWithMiddleware,
    project_id: Option<String>,
    database_url: Option<String>,
    timeout: Duration,
}

impl ProjectManagement {
    /// Creates a new `ProjectManagement` instance.
    ///
    /// This is typically called via `FirebaseApp::project_management()`.
    pub fn new(middleware: AuthMiddleware, options: &AppOptions) -> Self {
        let project_id = resolve_project_id(options, middleware.project_id());
        let client = build_client(middleware, options.max_transport_retries);
        let timeout = options.request_timeout;

        Self {
            request_handler: ProjectManagementRequestHandler::new(client.clone(), timeout),
            security_rules: SecurityRules::new(client.clone(), project_id.clone(), timeout),
            client,
            project_id,
            database_url: options.database_url.clone(),
            timeout,
        }
    }

    /// Creates a new `ProjectManagement` against custom hosts.
    /// Internal use only, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        management_host: &str,
        rules_base_url: String,
        project_id: Option<String>,
        database_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            request_handler: ProjectManagementRequestHandler::with_host(
                client.clone(),
                management_host,
                timeout,
            ),
            security_rules: SecurityRules::new_with_client(
                client.clone(),
                rules_base_url,
                project_id.clone(),
                timeout,
            ),
            client,
            project_id,
            database_url,
            timeout,
        }
    }

    /// Replaces the poller used to wait for app creation.
    pub fn with_poller(mut self, poller: ExponentialBackoffPoller) -> Self {
        self.request_handler.set_poller(poller);
        self
    }

    /// The Rules API client used for Firestore and Storage rules.
    pub fn security_rules(&self) -> &SecurityRules {
        &self.security_rules
    }

    fn parent(&self) -> Result<String, ProjectManagementError> {
        let project_id = self.project_id.as_deref().ok_or_else(|| {
            ProjectManagementError::new(
                ErrorCode::InvalidProjectId,
                "Failed to determine project ID. Initialize the SDK with service account \
                 credentials or set project ID as an app option. Alternatively, set the \
                 GOOGLE_CLOUD_PROJECT environment variable.",
            )
        })?;
        Ok(format!("projects/{}", project_id))
    }

    fn database_rules(&self) -> Result<DatabaseRules, ProjectManagementError> {
        DatabaseRules::new(self.client.clone(), self.database_url.as_deref(), self.timeout)
    }

    pub async fn list_android_apps(&self) -> Result<Vec<AndroidApp>, ProjectManagementError> {
        let value = self.request_handler.list_android_apps(&self.parent()?).await?;
        parse_app_list(&value, "listAndroidApps")?
            .into_iter()
            .map(|app| {
                AndroidApp::new(app.app_id.unwrap_or_default(), self.request_handler.clone())
            })
            .collect()
    }

    pub async fn list_ios_apps(&self) -> Result<Vec<IosApp>, ProjectManagementError> {
        let value = self.request_handler.list_ios_apps(&self.parent()?).await?;
        parse_app_list(&value, "listIosApps")?
            .into_iter()
            .map(|app| IosApp::new(app.app_id.unwrap_or_default(), self.request_handler.clone()))
            .collect()
    }

    /// Lists the metadata of every app in the project, whatever its platform.
    pub async fn list_app_metadata(&self) -> Result<Vec<AppMetadata>, ProjectManagementError> {
        let parent = self.parent()?;
        let value = self.request_handler.list_app_metadata(&parent).await?;
        let fallback_project = parent.trim_start_matches("projects/");

        parse_app_list(&value, "listAppMetadata")?
            .into_iter()
            .map(|app| {
                let resource_name = require_field(
                    app.name,
                    &value,
                    "\"apps[].name\" field must be present in the listAppMetadata() response data.",
                )?;
                let project_id = resource_name::project_id_of(&resource_name)
                    .map(str::to_string)
                    .or(app.project_id)
                    .unwrap_or_else(|| fallback_project.to_string());
                Ok(AppMetadata {
                    app_id: app.app_id.unwrap_or_default(),
                    display_name: app.display_name,
                    platform: AppPlatform::from_api(app.platform.as_deref()),
                    project_id,
                    resource_name,
                })
            })
            .collect()
    }

    /// A handle to an existing Android app. Makes no network call.
    pub fn android_app(&self, app_id: &str) -> Result<AndroidApp, ProjectManagementError> {
        AndroidApp::new(app_id.to_string(), self.request_handler.clone())
    }

    /// A handle to an existing iOS app. Makes no network call.
    pub fn ios_app(&self, app_id: &str) -> Result<IosApp, ProjectManagementError> {
        IosApp::new(app_id.to_string(), self.request_handler.clone())
    }

    pub fn sha_certificate(
        &self,
        sha_hash: &str,
    ) -> Result<ShaCertificate, ProjectManagementError> {
        ShaCertificate::new(sha_hash)
    }

    /// Registers a new Android app and waits for the backend to finish provisioning it.
    pub async fn create_android_app(
        &self,
        package_name: &str,
        display_name: Option<&str>,
    ) -> Result<AndroidApp, ProjectManagementError> {
        if package_name.is_empty() {
            return Err(ProjectManagementError::invalid_argument(
                "packageName must be a non-empty string.",
            ));
        }
        let mut body = json!({ "packageName": package_name });
        if let Some(display_name) = display_name {
            body["displayName"] = json!(display_name);
        }

        let value = self
            .request_handler
            .create_android_app(&self.parent()?, body)
            .await?;
        let app_id = created_app_id(&value, "createAndroidApp")?;
        AndroidApp::new(app_id, self.request_handler.clone())
    }

    pub async fn create_ios_app(
        &self,
        bundle_id: &str,
        display_name: Option<&str>,
    ) -> Result<IosApp, ProjectManagementError> {
        if bundle_id.is_empty() {
            return Err(ProjectManagementError::invalid_argument(
                "bundleId must be a non-empty string.",
            ));
        }
        let mut body = json!({ "bundleId": bundle_id });
        if let Some(display_name) = display_name {
            body["displayName"] = json!(display_name);
        }

        let value = self.request_handler.create_ios_app(&self.parent()?, body).await?;
        let app_id = created_app_id(&value, "createIosApp")?;
        IosApp::new(app_id, self.request_handler.clone())
    }

    /// Returns the rules source currently deployed for `service` (`"firestore"`, `"storage"` or
    /// `"database"`).
    pub async fn get_rules(&self, service: &str) -> Result<String, ProjectManagementError> {
        let service = RulesService::parse(service, "getRules")?;
        let Some(release_name) = service.release_name() else {
            return self.database_rules()?.get_rules().await;
        };

        let release = self.security_rules.get_release(release_name).await?;
        debug!(release = release_name, ruleset = %release.ruleset_id, "resolved release");
        let ruleset = self.security_rules.get_ruleset(&release.ruleset_id).await?;

        match ruleset.files.as_slice() {
            [file] => Ok(file.content.clone()),
            files => Err(ProjectManagementError::invalid_server_response(
                &format!(
                    "Ruleset \"{}\" must contain exactly one rules file, found {}.",
                    ruleset.id,
                    files.len()
                ),
                &json!({ "files": files }),
            )),
        }
    }

    /// Publishes `content` as the rules of `service`.
    pub async fn set_rules(
        &self,
        service: &str,
        content: &str,
    ) -> Result<(), ProjectManagementError> {
        let service = RulesService::parse(service, "setRules")?;
        let Some(release_name) = service.release_name() else {
            return self.database_rules()?.set_rules(content).await;
        };

        let file = RulesFile {
            name: service.rules_file_name().to_string(),
            content: content.to_string(),
        };
        let ruleset = self.security_rules.create_ruleset(vec![file]).await?;
        debug!(release = release_name, ruleset = %ruleset.id, "created ruleset");

        match self.security_rules.update_release(release_name, &ruleset.id).await {
            Ok(_) => {
                debug!(release = release_name, ruleset = %ruleset.id, "repointed release");
                Ok(())
            }
            // Only a missing release is created. Any other failure, transient or not,
            // propagates with its own code.
            Err(e) if e.code() == ErrorCode::NotFound => {
                warn!(release = release_name, error = %e, "release not found, creating release");
                self.security_rules.create_release(release_name, &ruleset.id).await?;
                debug!(release = release_name, ruleset = %ruleset.id, "created release");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reads rules from `path` and publishes them with [`ProjectManagement::set_rules`].
    pub async fn set_rules_from_file(
        &self,
        service: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), ProjectManagementError> {
        let path = path.as_ref();
        RulesService::parse(service, "setRules")?;
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProjectManagementError::invalid_argument(format!(
                "Failed to read rules file \"{}\": {}",
                path.display(),
                e
            ))
        })?;
        self.set_rules(service, &content).await
    }

    pub async fn get_ruleset(
        &self,
        ruleset_id: &str,
    ) -> Result<RulesetWithFiles, ProjectManagementError> {
        self.security_rules.get_ruleset(ruleset_id).await
    }

    pub async fn list_rulesets(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<RulesetList, ProjectManagementError> {
        self.security_rules.list_rulesets(page_size, page_token).await
    }

    pub async fn delete_ruleset(&self, ruleset_id: &str) -> Result<(), ProjectManagementError> {
        self.security_rules.delete_ruleset(ruleset_id).await
    }

    pub async fn get_release(&self, name: &str) -> Result<RulesRelease, ProjectManagementError> {
        self.security_rules.get_release(name).await
    }

    pub async fn list_releases(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ReleaseList, ProjectManagementError> {
        self.security_rules.list_releases(page_size, page_token).await
    }

    pub async fn delete_release(&self, name: &str) -> Result<(), ProjectManagementError> {
        self.security_rules.delete_release(name).await
    }
}

/// Validates a list response: `apps` may be absent but every entry needs an `appId`.
fn parse_app_list(
    value: &Value,
    operation: &str,
) -> Result<Vec<AppJson>, ProjectManagementError> {
    let response: ListAppsResponse =
        parse_response(value, &format!("{}()'s responseData", operation))?;
    let apps = response.apps.unwrap_or_default();
    for app in &apps {
        if app.app_id.as_deref().map_or(true, str::is_empty) {
            return Err(ProjectManagementError::invalid_server_response(
                &format!(
                    "\"apps[].appId\" field must be present in the {}() response data.",
                    operation
                ),
                value,
            ));
        }
    }
    Ok(apps)
}

fn created_app_id(value: &Value, operation: &str) -> Result<String, ProjectManagementError> {
    let app: AppJson = parse_response(value, &format!("{}()'s responseData", operation))?;
    require_field(
        app.app_id,
        value,
        &format!(
            "\"responseData.appId\" field must be present in {}()'s response data.",
            operation
        ),
    )
}

/// Decodes the base64 `configFileContents` of a config response.
pub(crate) fn decode_config(value: &Value) -> Result<String, ProjectManagementError> {
    let invalid = || {
        ProjectManagementError::invalid_server_response(
            "getConfig()'s responseData.configFileContents must be a base64 string.",
            value,
        )
    };
    let response: AppConfigResponse = parse_response(value, "getConfig()'s responseData")?;
    let encoded = response
        .config_file_contents
        .as_ref()
        .and_then(Value::as_str)
        .ok_or_else(invalid)?;
    let bytes = STANDARD.decode(encoded).map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}
