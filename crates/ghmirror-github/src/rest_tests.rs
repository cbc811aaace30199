//! Tests for [`RestGithub`] against a wiremock server.

use super::*;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RestGithub {
    let base = Url::parse(&format!("{}/", server.uri())).expect("mock server url");
    RestGithub::new(base).expect("client")
}

fn token() -> AccessToken {
    AccessToken::new("test-token")
}

#[tokio::test]
async fn test_get_repo_decodes_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo", "avatar_url": null, "type": "Organization" },
            "private": true,
            "default_branch": "main",
            "visibility": "private",
            "stargazers_count": 7,
            "updated_at": "2026-02-18T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let repo = client_for(&server)
        .get_repo(&token(), "octo", "widgets")
        .await
        .expect("get_repo");
    assert_eq!(repo.id, 12345);
    assert_eq!(repo.full_name, "octo/widgets");
    assert_eq!(repo.default_branch.as_deref(), Some("main"));
    assert_eq!(repo.stargazers_count, Some(7));
}

#[tokio::test]
async fn test_list_pulls_follows_link_header() {
    let server = MockServer::start().await;
    let link = format!(
        "<{}/repos/octo/widgets/pulls?page=2>; rel=\"next\"",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/pulls"))
        .and(query_param("state", "all"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", link.as_str())
                .set_body_json(serde_json::json!([{
                    "id": 900,
                    "number": 5,
                    "title": "Add parser",
                    "body": null,
                    "state": "open",
                    "draft": false,
                    "user": { "id": 1, "login": "octo", "avatar_url": null, "type": "User" },
                    "head": { "sha": "abc123", "ref": "feature" },
                    "base": { "sha": "def456", "ref": "main" },
                    "mergeable_state": "clean",
                    "merged_at": null,
                    "closed_at": null,
                    "updated_at": "2026-02-18T10:00:00Z",
                    "labels": []
                }])),
        )
        .mount(&server)
        .await;

    let page = client_for(&server)
        .list_pulls(&token(), "octo", "widgets", 1)
        .await
        .expect("list_pulls");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].number, 5);
    assert_eq!(page.next_page, Some(2));
}

#[tokio::test]
async fn test_rate_limited_403_maps_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("retry-after", "42")
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_string("API rate limit exceeded"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_repo(&token(), "octo", "widgets")
        .await
        .expect_err("must fail");
    match err {
        ApiError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(42)));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_403_maps_to_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_repo(&token(), "octo", "widgets")
        .await
        .expect_err("must fail");
    assert!(matches!(err, ApiError::Auth { .. }));
}

#[tokio::test]
async fn test_server_error_is_transient_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_repo(&token(), "octo", "widgets")
        .await
        .expect_err("must fail");
    assert!(matches!(err, ApiError::Upstream { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_create_issue_posts_title_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 5001,
            "number": 99,
            "title": "X",
            "body": null,
            "state": "open",
            "user": { "id": 1001, "login": "u", "avatar_url": null, "type": "User" },
            "labels": [],
            "assignees": [],
            "pull_request": null,
            "created_at": "2026-02-18T10:00:00Z",
            "updated_at": "2026-02-18T10:00:00Z",
            "closed_at": null
        })))
        .mount(&server)
        .await;

    let issue = client_for(&server)
        .create_issue(&token(), "octo", "widgets", "X", None)
        .await
        .expect("create_issue");
    assert_eq!(issue.number, 99);
    assert_eq!(issue.id, 5001);
}

#[tokio::test]
async fn test_create_hook_returns_hook_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/hooks"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": 777 })),
        )
        .mount(&server)
        .await;

    let hook_id = client_for(&server)
        .create_hook(
            &token(),
            "octo",
            "widgets",
            "https://mirror.example/api/github/webhook",
            "hook-secret",
        )
        .await
        .expect("create_hook");
    assert_eq!(hook_id, 777);
}
