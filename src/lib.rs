pub mod config;
pub mod core;
mod database;
pub mod project_management;
pub mod security_rules;

pub use config::AppOptions;
pub use crate::core::error::{ErrorCode, ProjectManagementError};
pub use crate::core::poller::ExponentialBackoffPoller;
pub use project_management::models::{
    AndroidAppMetadata, AppMetadata, AppPlatform, CertType, IosAppMetadata, ShaCertificate,
};
pub use project_management::{AndroidApp, IosApp, ProjectManagement};
pub use security_rules::SecurityRules;

use crate::config::resolve_project_id;
use crate::core::http::build_client;
use crate::core::middleware::AuthMiddleware;
use yup_oauth2::ServiceAccountKey;

/// A Firebase app authenticated with a service account.
pub struct FirebaseApp {
    middleware: AuthMiddleware,
    options: AppOptions,
}

impl FirebaseApp {
    /// Creates an app with options read from `FIREBASE_CONFIG`, if set.
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        Self::with_options(service_account_key, AppOptions::from_env())
    }

    pub fn with_options(service_account_key: ServiceAccountKey, options: AppOptions) -> Self {
        Self {
            middleware: AuthMiddleware::new(service_account_key),
            options,
        }
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn project_management(&self) -> ProjectManagement {
        ProjectManagement::new(self.middleware.clone(), &self.options)
    }

    pub fn security_rules(&self) -> SecurityRules {
        let project_id = resolve_project_id(&self.options, self.middleware.project_id());
        let client = build_client(self.middleware.clone(), self.options.max_transport_retries);
        SecurityRules::new(client, project_id, self.options.request_timeout)
    }
}
