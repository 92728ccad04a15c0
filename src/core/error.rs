//! Error taxonomy shared by every request handler.
//!
//! Backend failures are reduced to a closed set of [`ErrorCode`]s. Which HTTP status maps to which
//! code is data ([`StatusErrorMap`]) so each backend can attach its own meaning to a status.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::core::middleware::AuthTokenError;
use crate::core::FirebaseErrorResponse;

/// The closed set of error kinds reported by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    AuthenticationError,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    ResourceExhausted,
    InternalError,
    ServiceUnavailable,
    UnknownError,
    InvalidServerResponse,
    InvalidProjectId,
}

impl ErrorCode {
    /// The kebab-case identifier of this kind, e.g. `"already-exists"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::AuthenticationError => "authentication-error",
            ErrorCode::NotFound => "not-found",
            ErrorCode::AlreadyExists => "already-exists",
            ErrorCode::FailedPrecondition => "failed-precondition",
            ErrorCode::ResourceExhausted => "resource-exhausted",
            ErrorCode::InternalError => "internal-error",
            ErrorCode::ServiceUnavailable => "service-unavailable",
            ErrorCode::UnknownError => "unknown-error",
            ErrorCode::InvalidServerResponse => "invalid-server-response",
            ErrorCode::InvalidProjectId => "invalid-project-id",
        }
    }

    fn http_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "Invalid argument provided.",
            ErrorCode::AuthenticationError => {
                "An error occurred when trying to authenticate. Make sure the credential used to \
                 authenticate this SDK has the proper permissions."
            }
            ErrorCode::NotFound => "The specified entity could not be found.",
            ErrorCode::AlreadyExists => "The specified entity already exists.",
            ErrorCode::FailedPrecondition => "The resource is locked and cannot be modified.",
            ErrorCode::ResourceExhausted => "Quota exceeded for the requested resource.",
            ErrorCode::InternalError => "An internal error has occurred. Please retry the request.",
            ErrorCode::ServiceUnavailable => {
                "The server could not process the request in time. See the error documentation \
                 for more details."
            }
            _ => "An unknown server error was returned.",
        }
    }

    /// Maps a canonical status name such as `NOT_FOUND` to an error kind.
    pub(crate) fn from_canonical_status(status: &str) -> Option<Self> {
        let code = match status {
            "INVALID_ARGUMENT" | "OUT_OF_RANGE" => ErrorCode::InvalidArgument,
            "UNAUTHENTICATED" | "PERMISSION_DENIED" => ErrorCode::AuthenticationError,
            "NOT_FOUND" => ErrorCode::NotFound,
            "ALREADY_EXISTS" => ErrorCode::AlreadyExists,
            "FAILED_PRECONDITION" => ErrorCode::FailedPrecondition,
            "RESOURCE_EXHAUSTED" => ErrorCode::ResourceExhausted,
            "INTERNAL" => ErrorCode::InternalError,
            "UNAVAILABLE" | "DEADLINE_EXCEEDED" => ErrorCode::ServiceUnavailable,
            _ => return None,
        };
        Some(code)
    }

    /// Maps a numeric google.rpc canonical code (as found in operation payloads).
    pub(crate) fn from_rpc_code(code: i64) -> Option<Self> {
        let code = match code {
            3 | 11 => ErrorCode::InvalidArgument,
            5 => ErrorCode::NotFound,
            6 => ErrorCode::AlreadyExists,
            7 | 16 => ErrorCode::AuthenticationError,
            8 => ErrorCode::ResourceExhausted,
            9 => ErrorCode::FailedPrecondition,
            13 => ErrorCode::InternalError,
            4 | 14 => ErrorCode::ServiceUnavailable,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by project management, security rules and database rules operations.
#[derive(Error, Debug)]
pub enum ProjectManagementError {
    /// A validation failure or a backend error translated into the taxonomy.
    #[error("{message}")]
    Api { code: ErrorCode, message: String },
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
}

impl ProjectManagementError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ProjectManagementError::Api {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// A 2xx response that is missing or mistyping a documented field.
    pub(crate) fn invalid_server_response(message: &str, payload: &Value) -> Self {
        let payload = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        Self::new(
            ErrorCode::InvalidServerResponse,
            format!("{} Response data: {}", message, payload),
        )
    }

    /// The error kind. Transport timeouts report `service-unavailable` and token failures
    /// `authentication-error`.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProjectManagementError::Api { code, .. } => *code,
            ProjectManagementError::RequestError(e) if e.is_timeout() => {
                ErrorCode::ServiceUnavailable
            }
            ProjectManagementError::MiddlewareError(reqwest_middleware::Error::Reqwest(e))
                if e.is_timeout() =>
            {
                ErrorCode::ServiceUnavailable
            }
            ProjectManagementError::MiddlewareError(reqwest_middleware::Error::Middleware(e))
                if e.chain().any(|cause| cause.is::<AuthTokenError>()) =>
            {
                ErrorCode::AuthenticationError
            }
            _ => ErrorCode::UnknownError,
        }
    }

    /// Whether the backend answered with an error, as opposed to a transport failure.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, ProjectManagementError::Api { .. })
    }
}

/// Deserializes a successful response body, reporting any shape mismatch as
/// `invalid-server-response` with the offending payload attached.
pub(crate) fn parse_response<T: DeserializeOwned>(
    value: &Value,
    context: &str,
) -> Result<T, ProjectManagementError> {
    if !value.is_object() {
        return Err(ProjectManagementError::invalid_server_response(
            &format!("{} must be a non-null object.", context),
            value,
        ));
    }
    T::deserialize(value).map_err(|e| {
        ProjectManagementError::invalid_server_response(&format!("{}: {}.", context, e), value)
    })
}

/// Unwraps a required non-empty string field of a response.
pub(crate) fn require_field(
    field: Option<String>,
    payload: &Value,
    message: &str,
) -> Result<String, ProjectManagementError> {
    field
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProjectManagementError::invalid_server_response(message, payload))
}

/// Status code to error kind table used by one backend.
#[derive(Debug, Clone)]
pub struct StatusErrorMap {
    codes: HashMap<u16, ErrorCode>,
}

impl Default for StatusErrorMap {
    fn default() -> Self {
        let codes = HashMap::from([
            (400, ErrorCode::InvalidArgument),
            (401, ErrorCode::AuthenticationError),
            (403, ErrorCode::AuthenticationError),
            (404, ErrorCode::NotFound),
            (409, ErrorCode::AlreadyExists),
            (423, ErrorCode::ServiceUnavailable),
            (500, ErrorCode::InternalError),
            (503, ErrorCode::ServiceUnavailable),
        ]);
        Self { codes }
    }
}

impl StatusErrorMap {
    /// Adds or replaces the kind reported for `status`.
    pub fn with(mut self, status: u16, code: ErrorCode) -> Self {
        self.codes.insert(status, code);
        self
    }

    pub fn lookup(&self, status: u16) -> Option<ErrorCode> {
        self.codes.get(&status).copied()
    }

    /// Translates a failed HTTP exchange. Unmapped statuses fall back to the canonical status in
    /// the JSON error body, then to `unknown-error`.
    pub fn wrap_http_error(&self, status: u16, text: &str) -> ProjectManagementError {
        let code = self
            .lookup(status)
            .or_else(|| {
                serde_json::from_str::<FirebaseErrorResponse>(text)
                    .ok()
                    .and_then(|body| body.error.status)
                    .and_then(|s| ErrorCode::from_canonical_status(&s))
            })
            .unwrap_or(ErrorCode::UnknownError);

        let text = if text.is_empty() { "<missing>" } else { text };
        ProjectManagementError::new(
            code,
            format!(
                "{} Status code: {}. Raw server response: \"{}\".",
                code.http_message(),
                status,
                text
            ),
        )
    }

    /// Translates the `error` member of a long-running operation.
    pub fn wrap_operation_error(&self, code: i64, message: &str) -> ProjectManagementError {
        let kind = u16::try_from(code)
            .ok()
            .and_then(|status| self.lookup(status))
            .or_else(|| ErrorCode::from_rpc_code(code))
            .unwrap_or(ErrorCode::UnknownError);
        ProjectManagementError::new(kind, format!("{} Status code: {}.", message, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_mapping() {
        let map = StatusErrorMap::default();
        assert_eq!(map.wrap_http_error(400, "").code(), ErrorCode::InvalidArgument);
        assert_eq!(map.wrap_http_error(401, "").code(), ErrorCode::AuthenticationError);
        assert_eq!(map.wrap_http_error(403, "").code(), ErrorCode::AuthenticationError);
        assert_eq!(map.wrap_http_error(404, "").code(), ErrorCode::NotFound);
        assert_eq!(map.wrap_http_error(409, "").code(), ErrorCode::AlreadyExists);
        assert_eq!(map.wrap_http_error(423, "").code(), ErrorCode::ServiceUnavailable);
        assert_eq!(map.wrap_http_error(500, "").code(), ErrorCode::InternalError);
        assert_eq!(map.wrap_http_error(503, "").code(), ErrorCode::ServiceUnavailable);
        assert_eq!(map.wrap_http_error(1337, "").code(), ErrorCode::UnknownError);
        assert_eq!(map.wrap_http_error(429, "").code(), ErrorCode::UnknownError);
    }

    #[test]
    fn test_override_status_mapping() {
        let map = StatusErrorMap::default()
            .with(423, ErrorCode::FailedPrecondition)
            .with(429, ErrorCode::ResourceExhausted);
        assert_eq!(map.wrap_http_error(423, "").code(), ErrorCode::FailedPrecondition);
        assert_eq!(map.wrap_http_error(429, "").code(), ErrorCode::ResourceExhausted);
    }

    #[test]
    fn test_message_embeds_status_and_text() {
        let err = StatusErrorMap::default().wrap_http_error(404, "no such app");
        assert_eq!(
            err.to_string(),
            "The specified entity could not be found. Status code: 404. \
             Raw server response: \"no such app\"."
        );

        let err = StatusErrorMap::default().wrap_http_error(500, "");
        assert!(err.to_string().ends_with("Raw server response: \"<missing>\"."));
    }

    #[test]
    fn test_unmapped_status_uses_error_body() {
        let body = r#"{"error":{"code":499,"message":"gone","status":"NOT_FOUND"}}"#;
        let err = StatusErrorMap::default().wrap_http_error(499, body);
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_operation_error_mapping() {
        let map = StatusErrorMap::default();
        assert_eq!(map.wrap_operation_error(409, "dup").code(), ErrorCode::AlreadyExists);
        assert_eq!(map.wrap_operation_error(6, "dup").code(), ErrorCode::AlreadyExists);
        assert_eq!(map.wrap_operation_error(5, "missing").code(), ErrorCode::NotFound);
        assert_eq!(map.wrap_operation_error(-1, "odd").code(), ErrorCode::UnknownError);
        assert_eq!(
            map.wrap_operation_error(6, "App already exists.").to_string(),
            "App already exists. Status code: 6."
        );
    }

    #[test]
    fn test_token_failure_is_authentication_error() {
        let err = ProjectManagementError::MiddlewareError(reqwest_middleware::Error::middleware(
            AuthTokenError("no credentials".to_string()),
        ));
        assert_eq!(err.code(), ErrorCode::AuthenticationError);
        assert!(!err.is_backend_error());

        let err = ProjectManagementError::MiddlewareError(reqwest_middleware::Error::Middleware(
            anyhow::anyhow!("something else"),
        ));
        assert_eq!(err.code(), ErrorCode::UnknownError);
    }

    #[test]
    fn test_invalid_server_response_embeds_payload() {
        let payload = serde_json::json!({ "apps": "not-an-array" });
        let err = ProjectManagementError::invalid_server_response("Bad apps.", &payload);
        assert_eq!(err.code(), ErrorCode::InvalidServerResponse);
        assert!(err.to_string().starts_with("Bad apps. Response data: "));
        assert!(err.to_string().contains("not-an-array"));
    }
}
