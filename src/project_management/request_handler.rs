//! Endpoints of the Firebase Management API.

use std::time::Duration;

use reqwest::Method;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::core::error::{parse_response, require_field, ErrorCode, ProjectManagementError};
use crate::core::http::{ApiVersion, HandlerConfig, RequestExecutor};
use crate::core::poller::{ExponentialBackoffPoller, PollError};
use crate::project_management::models::ShaCertificate;

const PROJECT_MANAGEMENT_HOST: &str = "https://firebase.googleapis.com";
const LIST_APPS_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: Option<String>,
}

/// Raw access to the app-management backend. Responses are returned as JSON for the façades to
/// validate.
#[derive(Clone)]
pub(crate) struct ProjectManagementRequestHandler {
    executor: RequestExecutor,
    poller: ExponentialBackoffPoller,
}

impl ProjectManagementRequestHandler {
    pub(crate) fn new(client: ClientWithMiddleware, timeout: Duration) -> Self {
        Self::with_host(client, PROJECT_MANAGEMENT_HOST, timeout)
    }

    /// Points the handler at `host`, serving `/v1` and `/v1beta1`.
    pub(crate) fn with_host(client: ClientWithMiddleware, host: &str, timeout: Duration) -> Self {
        let host = host.trim_end_matches('/');
        let config = HandlerConfig::new(format!("{}/v1", host))
            .alternate_base_url(format!("{}/v1beta1", host))
            .timeout(timeout);
        Self {
            executor: RequestExecutor::new(client, config),
            poller: ExponentialBackoffPoller::default(),
        }
    }

    pub(crate) fn set_poller(&mut self, poller: ExponentialBackoffPoller) {
        self.poller = poller;
    }

    async fn get(&self, path: &str) -> Result<Value, ProjectManagementError> {
        self.executor
            .invoke_json(Method::GET, path, None, ApiVersion::Alternate)
            .await
    }

    pub(crate) async fn list_android_apps(
        &self,
        parent: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(&format!(
            "{}/androidApps?page_size={}",
            parent, LIST_APPS_MAX_PAGE_SIZE
        ))
        .await
    }

    pub(crate) async fn list_ios_apps(
        &self,
        parent: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(&format!("{}/iosApps?page_size={}", parent, LIST_APPS_MAX_PAGE_SIZE))
            .await
    }

    pub(crate) async fn list_app_metadata(
        &self,
        parent: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(&format!(
            "{}:searchApps?page_size={}",
            parent, LIST_APPS_MAX_PAGE_SIZE
        ))
        .await
    }

    pub(crate) async fn create_android_app(
        &self,
        parent: &str,
        body: Value,
    ) -> Result<Value, ProjectManagementError> {
        self.create_app(&format!("{}/androidApps", parent), body, "createAndroidApp")
            .await
    }

    pub(crate) async fn create_ios_app(
        &self,
        parent: &str,
        body: Value,
    ) -> Result<Value, ProjectManagementError> {
        self.create_app(&format!("{}/iosApps", parent), body, "createIosApp")
            .await
    }

    async fn create_app(
        &self,
        path: &str,
        body: Value,
        operation: &str,
    ) -> Result<Value, ProjectManagementError> {
        let value = self
            .executor
            .invoke_json(Method::POST, path, Some(body), ApiVersion::Alternate)
            .await?;
        let handle: OperationHandle =
            parse_response(&value, &format!("{}()'s initial response", operation))?;
        let operation_name = require_field(
            handle.name,
            &value,
            &format!(
                "\"responseData.name\" field must be present in {}()'s initial response data.",
                operation
            ),
        )?;
        self.poll_remote_operation(&operation_name).await
    }

    /// Waits for a long-running operation and returns its `response` payload.
    async fn poll_remote_operation(
        &self,
        operation_name: &str,
    ) -> Result<Value, ProjectManagementError> {
        let executor = &self.executor;
        let result = self
            .poller
            .poll(|| async move {
                let value = executor
                    .invoke_json(Method::GET, operation_name, None, ApiVersion::Stable)
                    .await?;
                let operation: OperationResponse = parse_response(&value, "Operation response")?;

                if let Some(error) = operation.error {
                    let code = error.code.unwrap_or(500);
                    let message = error
                        .message
                        .unwrap_or_else(|| value["error"].to_string());
                    return Err(executor
                        .config()
                        .status_errors
                        .wrap_operation_error(code, &message));
                }
                if !operation.done {
                    return Ok(None);
                }
                match operation.response {
                    Some(response) => Ok(Some(response)),
                    None => Err(ProjectManagementError::invalid_server_response(
                        "Operation is done but the \"response\" field is missing.",
                        &value,
                    )),
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(PollError::Probe(e)) => Err(e),
            Err(PollError::DeadlineExceeded { attempts, elapsed }) => {
                warn!(
                    operation = operation_name,
                    attempts,
                    ?elapsed,
                    "operation polling timed out"
                );
                Err(ProjectManagementError::new(
                    ErrorCode::ServiceUnavailable,
                    format!(
                        "Operation \"{}\" did not complete after {} attempts ({:?}).",
                        operation_name, attempts, elapsed
                    ),
                ))
            }
        }
    }

    pub(crate) async fn get_resource(
        &self,
        resource_name: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(resource_name).await
    }

    pub(crate) async fn set_display_name(
        &self,
        resource_name: &str,
        display_name: &str,
    ) -> Result<(), ProjectManagementError> {
        self.executor
            .invoke_json(
                Method::PATCH,
                &format!("{}?update_mask=display_name", resource_name),
                Some(json!({ "displayName": display_name })),
                ApiVersion::Alternate,
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn get_android_sha_certificates(
        &self,
        resource_name: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(&format!("{}/sha", resource_name)).await
    }

    pub(crate) async fn add_android_sha_certificate(
        &self,
        resource_name: &str,
        certificate: &ShaCertificate,
    ) -> Result<(), ProjectManagementError> {
        let body = json!({
            "shaHash": certificate.sha_hash(),
            "certType": certificate.cert_type().as_api(),
        });
        self.executor
            .invoke_json(
                Method::POST,
                &format!("{}/sha", resource_name),
                Some(body),
                ApiVersion::Alternate,
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn delete_resource(
        &self,
        resource_name: &str,
    ) -> Result<(), ProjectManagementError> {
        self.executor
            .invoke_json(Method::DELETE, resource_name, None, ApiVersion::Alternate)
            .await?;
        Ok(())
    }

    pub(crate) async fn get_config(
        &self,
        resource_name: &str,
    ) -> Result<Value, ProjectManagementError> {
        self.get(&format!("{}/config", resource_name)).await
    }
}
