use serde_json::Value;

use crate::core::error::{parse_response, require_field, ProjectManagementError};
use crate::project_management::models::{
    AndroidAppMetadata, AppJson, ShaCertificate, ShaCertificatesResponse,
};
use crate::project_management::request_handler::ProjectManagementRequestHandler;
use crate::project_management::decode_config;

/// A reference to an Android app in a Firebase project.
///
/// Holds only the app ID; metadata, certificates and config are fetched on demand.
#[derive(Clone)]
pub struct AndroidApp {
    app_id: String,
    resource_name: String,
    request_handler: ProjectManagementRequestHandler,
}

impl std::fmt::Debug for AndroidApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AndroidApp").field("app_id", &self.app_id).finish()
    }
}

impl AndroidApp {
    pub(crate) fn new(
        app_id: String,
        request_handler: ProjectManagementRequestHandler,
    ) -> Result<Self, ProjectManagementError> {
        if app_id.is_empty() {
            return Err(ProjectManagementError::invalid_argument(
                "appId must be a non-empty string.",
            ));
        }
        let resource_name = format!("projects/-/androidApps/{}", app_id);
        Ok(Self {
            app_id,
            resource_name,
            request_handler,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub async fn get_metadata(&self) -> Result<AndroidAppMetadata, ProjectManagementError> {
        let value = self.request_handler.get_resource(&self.resource_name).await?;
        let app: AppJson = parse_response(&value, "getMetadata()'s response")?;
        let missing = |field: &str| {
            format!(
                "getMetadata()'s responseData.{} must be a non-empty string.",
                field
            )
        };

        Ok(AndroidAppMetadata {
            resource_name: require_field(app.name, &value, &missing("name"))?,
            app_id: require_field(app.app_id, &value, &missing("appId"))?,
            project_id: require_field(app.project_id, &value, &missing("projectId"))?,
            package_name: require_field(
                app.package_name,
                &value,
                &missing("packageName"),
            )?,
            display_name: app.display_name,
        })
    }

    pub async fn set_display_name(
        &self,
        display_name: &str,
    ) -> Result<(), ProjectManagementError> {
        self.request_handler
            .set_display_name(&self.resource_name, display_name)
            .await
    }

    /// Lists the SHA certificates registered with this app.
    pub async fn get_sha_certificates(
        &self,
    ) -> Result<Vec<ShaCertificate>, ProjectManagementError> {
        let value = self
            .request_handler
            .get_android_sha_certificates(&self.resource_name)
            .await?;
        let missing = |field: &str| {
            format!(
                "\"{}\" field must be present in the getShaCertificates() response data.",
                field
            )
        };
        let response: ShaCertificatesResponse =
            parse_response(&value, "getShaCertificates()'s response").map_err(|_| {
                ProjectManagementError::invalid_server_response(&missing("certificates"), &value)
            })?;

        let Some(certificates) = response.certificates else {
            return Ok(Vec::new());
        };

        certificates
            .into_iter()
            .map(|cert| {
                let name = require_field(cert.name, &value, &missing("certificates[].name"))?;
                let sha_hash =
                    require_field(cert.sha_hash, &value, &missing("certificates[].shaHash"))?;
                require_field(cert.cert_type, &value, &missing("certificates[].certType"))?;
                ShaCertificate::with_resource_name(sha_hash, name).map_err(|e| {
                    ProjectManagementError::invalid_server_response(&e.to_string(), &value)
                })
            })
            .collect()
    }

    pub async fn add_sha_certificate(
        &self,
        certificate: &ShaCertificate,
    ) -> Result<(), ProjectManagementError> {
        self.request_handler
            .add_android_sha_certificate(&self.resource_name, certificate)
            .await
    }

    /// Deletes a certificate previously returned by [`AndroidApp::get_sha_certificates`].
    pub async fn delete_sha_certificate(
        &self,
        certificate: &ShaCertificate,
    ) -> Result<(), ProjectManagementError> {
        let resource_name = certificate.resource_name().ok_or_else(|| {
            ProjectManagementError::invalid_argument(
                "Specified certificate does not include a resourceName. (Use \
                 AndroidApp.get_sha_certificates() to retrieve certificates with a resourceName.)",
            )
        })?;
        self.request_handler.delete_resource(resource_name).await
    }

    /// Returns the contents of the app's `google-services.json`.
    pub async fn get_config(&self) -> Result<String, ProjectManagementError> {
        let value: Value = self.request_handler.get_config(&self.resource_name).await?;
        decode_config(&value)
    }
}
