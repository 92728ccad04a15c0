//! Fully-qualified backend resource names and their short forms.
//!
//! The backends address entities as `projects/{project}/{collection}/{id}`; the public API only
//! ever exposes the trailing `{id}`.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::error::ProjectManagementError;

static RELEASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^projects/([^/]+)/releases/([^/]+)$").expect("valid regex"));
static RULESET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^projects/([^/]+)/rulesets/([^/]+)$").expect("valid regex"));
static PROJECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^projects/([^/]+)/").expect("valid regex"));

/// Collections whose names are shortened for the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Releases,
    Rulesets,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Releases => "releases",
            Collection::Rulesets => "rulesets",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Collection::Releases => &RELEASE_NAME,
            Collection::Rulesets => &RULESET_NAME,
        }
    }
}

/// Builds `projects/{project_id}/{collection}/{short_id}`.
pub fn build(project_id: &str, collection: Collection, short_id: &str) -> String {
    format!("projects/{}/{}/{}", project_id, collection.as_str(), short_id)
}

/// Returns the trailing id of `full_name`.
///
/// Names come from the backend, so a mismatch is reported as `internal-error`.
pub fn shorten(full_name: &str, collection: Collection) -> Result<String, ProjectManagementError> {
    collection
        .pattern()
        .captures(full_name)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ProjectManagementError::internal(format!(
                "Malformed {} resource name: \"{}\".",
                collection.as_str(),
                full_name
            ))
        })
}

/// Extracts `{project}` from any `projects/{project}/...` name.
pub fn project_id_of(name: &str) -> Option<&str> {
    PROJECT_PREFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;

    #[test]
    fn test_build_and_shorten() {
        for (project, id) in [
            ("test-project", "cloud.firestore"),
            ("p", "firebase.storage"),
            ("my-project-123", "a"),
        ] {
            let full = build(project, Collection::Releases, id);
            assert_eq!(full, format!("projects/{}/releases/{}", project, id));
            assert_eq!(shorten(&full, Collection::Releases).unwrap(), id);
        }

        let uuid = "3a7e3b0e-9e6b-4f3e-8a4c-1d2b3c4d5e6f";
        let full = build("test-project", Collection::Rulesets, uuid);
        assert_eq!(shorten(&full, Collection::Rulesets).unwrap(), uuid);
        let short = shorten(&full, Collection::Rulesets).unwrap();
        assert_eq!(build("test-project", Collection::Rulesets, &short), full);
    }

    #[test]
    fn test_shorten_rejects_malformed_names() {
        for name in [
            "",
            "rulesets/abc",
            "projects/p/rulesets/",
            "projects/p/rulesets/a/b",
            "projects//rulesets/abc",
            "projects/p/releases/abc",
        ] {
            let err = shorten(name, Collection::Rulesets).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InternalError, "{}", name);
        }
    }

    #[test]
    fn test_project_id_of() {
        assert_eq!(
            project_id_of("projects/test-project/androidApps/1:2:android:3"),
            Some("test-project")
        );
        assert_eq!(project_id_of("apps/1"), None);
    }
}
