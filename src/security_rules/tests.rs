use super::*;
use crate::core::error::ErrorCode;
use crate::core::http::DEFAULT_TIMEOUT;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

const RULESET_ID: &str = "3a7e3b0e-9e6b-4f3e-8a4c-1d2b3c4d5e6f";

fn rules_client(server: &MockServer) -> SecurityRules {
    let client = ClientBuilder::new(Client::new()).build();
    SecurityRules::new_with_client(
        client,
        server.url("/v1"),
        Some("test-project".to_string()),
        DEFAULT_TIMEOUT,
    )
}

fn ruleset_json() -> serde_json::Value {
    json!({
        "name": format!("projects/test-project/rulesets/{}", RULESET_ID),
        "createTime": "2024-01-02T03:04:05.000000Z",
        "source": {
            "files": [{ "name": "firestore.rules", "content": "service cloud.firestore {}" }]
        }
    })
}

#[tokio::test]
async fn test_get_ruleset() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/v1/projects/test-project/rulesets/{}", RULESET_ID));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(ruleset_json());
        })
        .await;

    let ruleset = rules_client(&server).get_ruleset(RULESET_ID).await.unwrap();
    assert_eq!(ruleset.id, RULESET_ID);
    assert_eq!(ruleset.files.len(), 1);
    assert_eq!(ruleset.files[0].name, "firestore.rules");
    assert_eq!(ruleset.create_time.to_rfc3339(), "2024-01-02T03:04:05+00:00");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_ruleset_validates_name() {
    let server = MockServer::start_async().await;
    let rules = rules_client(&server);

    let err = rules.get_ruleset("").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = rules.get_ruleset("a/b").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn test_missing_project_id() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let rules = SecurityRules::new_with_client(client, server.url("/v1"), None, DEFAULT_TIMEOUT);
    assert!(rules.project_id().is_none());

    let err = rules.get_release("cloud.firestore").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidProjectId);
}

#[tokio::test]
async fn test_malformed_ruleset_name_is_internal_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/projects/test-project/rulesets/{}", RULESET_ID));
            then.status(200).json_body(json!({
                "name": "rulesets/oops",
                "createTime": "2024-01-02T03:04:05Z"
            }));
        })
        .await;

    let err = rules_client(&server).get_ruleset(RULESET_ID).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);
}

#[tokio::test]
async fn test_create_ruleset() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/rulesets")
                .json_body(json!({
                    "source": {
                        "files": [{
                            "name": "firestore.rules",
                            "content": "service cloud.firestore {}"
                        }]
                    }
                }));
            then.status(200).json_body(ruleset_json());
        })
        .await;

    let ruleset = rules_client(&server)
        .create_ruleset(vec![RulesFile {
            name: "firestore.rules".to_string(),
            content: "service cloud.firestore {}".to_string(),
        }])
        .await
        .unwrap();
    assert_eq!(ruleset.id, RULESET_ID);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_release_and_update_release() {
    let server = MockServer::start_async().await;
    let release = json!({
        "name": "projects/test-project/releases/cloud.firestore",
        "rulesetName": format!("projects/test-project/rulesets/{}", RULESET_ID),
        "createTime": "2024-01-02T03:04:05Z",
        "updateTime": "2024-01-03T03:04:05Z"
    });

    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/projects/test-project/releases")
                .json_body(json!({
                    "name": "projects/test-project/releases/cloud.firestore",
                    "rulesetName": format!("projects/test-project/rulesets/{}", RULESET_ID)
                }));
            then.status(200).json_body(release.clone());
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/v1/projects/test-project/releases/cloud.firestore")
                .json_body(json!({
                    "release": {
                        "name": "projects/test-project/releases/cloud.firestore",
                        "rulesetName": format!("projects/test-project/rulesets/{}", RULESET_ID)
                    }
                }));
            then.status(200).json_body(release.clone());
        })
        .await;

    let rules = rules_client(&server);
    let created = rules.create_release("cloud.firestore", RULESET_ID).await.unwrap();
    assert_eq!(created.name, "cloud.firestore");
    assert_eq!(created.ruleset_id, RULESET_ID);
    assert!(created.update_time.is_some());

    let updated = rules.update_release("cloud.firestore", RULESET_ID).await.unwrap();
    assert_eq!(updated, created);

    create.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn test_release_errors_map_statuses() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/projects/test-project/releases");
            then.status(409).json_body(json!({
                "error": {
                    "code": 409,
                    "message": "Release already exists.",
                    "status": "ALREADY_EXISTS"
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/projects/test-project/releases/firebase.storage");
            then.status(429).body("slow down");
        })
        .await;

    let rules = rules_client(&server);
    let err = rules.create_release("cloud.firestore", RULESET_ID).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    assert!(err.to_string().contains("Release already exists."));

    let err = rules.get_release("firebase.storage").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceExhausted);
}

#[tokio::test]
async fn test_list_rulesets() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/rulesets")
                .query_param("pageSize", "10")
                .query_param("pageToken", "next");
            then.status(200).json_body(json!({
                "rulesets": [{
                    "name": format!("projects/test-project/rulesets/{}", RULESET_ID),
                    "createTime": "2024-01-02T03:04:05Z"
                }],
                "nextPageToken": "after"
            }));
        })
        .await;

    let list = rules_client(&server).list_rulesets(Some(10), Some("next")).await.unwrap();
    assert_eq!(list.rulesets.len(), 1);
    assert_eq!(list.rulesets[0].id, RULESET_ID);
    assert_eq!(list.next_page_token.as_deref(), Some("after"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_releases_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/releases")
                .query_param("pageSize", "100");
            then.status(200).json_body(json!({}));
        })
        .await;

    let list = rules_client(&server).list_releases(None, None).await.unwrap();
    assert!(list.releases.is_empty());
    assert!(list.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_validates_paging_arguments() {
    let server = MockServer::start_async().await;
    let rules = rules_client(&server);

    for size in [0, 101] {
        let err = rules.list_rulesets(Some(size), None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
    let err = rules.list_releases(None, Some("")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn test_delete_ruleset_and_release() {
    let server = MockServer::start_async().await;
    let delete_ruleset = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(format!("/v1/projects/test-project/rulesets/{}", RULESET_ID));
            then.status(200).json_body(json!({}));
        })
        .await;
    let delete_release = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/v1/projects/test-project/releases/cloud.firestore");
            then.status(200).body("");
        })
        .await;

    let rules = rules_client(&server);
    rules.delete_ruleset(RULESET_ID).await.unwrap();
    rules.delete_release("cloud.firestore").await.unwrap();

    delete_ruleset.assert_async().await;
    delete_release.assert_async().await;
}
