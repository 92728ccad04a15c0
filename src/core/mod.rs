pub mod error;
pub mod http;
pub mod middleware;
pub mod poller;
pub mod resource_name;

use serde::Deserialize;

/// The JSON error envelope Google APIs return alongside a failing status.
#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    /// Canonical status name, e.g. `NOT_FOUND`.
    pub status: Option<String>,
}
