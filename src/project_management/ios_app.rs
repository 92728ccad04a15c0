use crate::core::error::{parse_response, require_field, ProjectManagementError};
use crate::project_management::decode_config;
use crate::project_management::models::{AppJson, IosAppMetadata};
use crate::project_management::request_handler::ProjectManagementRequestHandler;

/// A reference to an iOS app in a Firebase project.
#[derive(Clone)]
pub struct IosApp {
    app_id: String,
    resource_name: String,
    request_handler: ProjectManagementRequestHandler,
}

impl std::fmt::Debug for IosApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IosApp").field("app_id", &self.app_id).finish()
    }
}

impl IosApp {
    pub(crate) fn new(
        app_id: String,
        request_handler: ProjectManagementRequestHandler,
    ) -> Result<Self, ProjectManagementError> {
        if app_id.is_empty() {
            return Err(ProjectManagementError::invalid_argument(
                "appId must be a non-empty string.",
            ));
        }
        let resource_name = format!("projects/-/iosApps/{}", app_id);
        Ok(Self {
            app_id,
            resource_name,
            request_handler,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub async fn get_metadata(&self) -> Result<IosAppMetadata, ProjectManagementError> {
        let value = self.request_handler.get_resource(&self.resource_name).await?;
        let app: AppJson = parse_response(&value, "getMetadata()'s response")?;
        let missing = |field: &str| {
            format!(
                "getMetadata()'s responseData.{} must be a non-empty string.",
                field
            )
        };

        Ok(IosAppMetadata {
            resource_name: require_field(app.name, &value, &missing("name"))?,
            app_id: require_field(app.app_id, &value, &missing("appId"))?,
            project_id: require_field(app.project_id, &value, &missing("projectId"))?,
            bundle_id: require_field(app.bundle_id, &value, &missing("bundleId"))?,
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

    /// Returns the contents of the app's `GoogleService-Info.plist`.
    pub async fn get_config(&self) -> Result<String, ProjectManagementError> {
        let value = self.request_handler.get_config(&self.resource_name).await?;
        decode_config(&value)
    }
}
