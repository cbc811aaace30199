//! Tests for webhook payload decoding.

use super::*;

#[test]
fn test_issues_event_decodes_minimal_payload() {
    let payload = serde_json::json!({
        "action": "opened",
        "issue": {
            "id": 5001,
            "number": 1,
            "state": "open",
            "title": "T",
            "updated_at": "2026-02-18T10:00:00Z"
        },
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        },
        "sender": { "id": 1001, "login": "u" }
    });

    let event: IssuesEvent = serde_json::from_value(payload).expect("decode");
    assert_eq!(event.action, "opened");
    assert_eq!(event.issue.number, 1);
    assert_eq!(event.issue.title, "T");
    assert_eq!(event.repository.id, 12345);
    assert_eq!(event.sender.as_ref().map(|s| s.login.as_str()), Some("u"));
    assert!(event.issue.pull_request.is_none());
}

#[test]
fn test_issue_comment_on_pull_request_is_flagged() {
    let payload = serde_json::json!({
        "action": "created",
        "issue": {
            "id": 5002,
            "number": 7,
            "state": "open",
            "title": "PR title",
            "pull_request": { "url": "https://api.github.com/repos/octo/widgets/pulls/7" },
            "updated_at": "2026-02-18T10:00:00Z"
        },
        "comment": {
            "id": 9001,
            "body": "looks good",
            "user": { "id": 1001, "login": "u" },
            "created_at": "2026-02-18T10:00:00Z",
            "updated_at": "2026-02-18T10:00:00Z"
        },
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });

    let event: IssueCommentEvent = serde_json::from_value(payload).expect("decode");
    assert!(event.issue.pull_request.is_some());
    assert_eq!(event.comment.id, 9001);
}

#[test]
fn test_push_event_branch_extraction() {
    let payload = serde_json::json!({
        "ref": "refs/heads/main",
        "before": "aaa",
        "after": "bbb",
        "commits": [
            { "id": "bbb", "message": "fix parser\n\ndetails", "timestamp": "2026-02-18T10:00:00Z",
              "author": { "name": "U", "username": "u" } }
        ],
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });

    let event: PushEvent = serde_json::from_value(payload).expect("decode");
    assert_eq!(event.branch_name(), Some("main"));
    assert_eq!(event.commits.len(), 1);
}

#[test]
fn test_tag_push_has_no_branch() {
    let payload = serde_json::json!({
        "ref": "refs/tags/v1.0.0",
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });
    let event: PushEvent = serde_json::from_value(payload).expect("decode");
    assert_eq!(event.branch_name(), None);
}

#[test]
fn test_pull_request_event_decodes_refs() {
    let payload = serde_json::json!({
        "action": "synchronize",
        "pull_request": {
            "id": 900,
            "number": 5,
            "title": "Add parser",
            "state": "open",
            "draft": false,
            "head": { "sha": "abc", "ref": "feature" },
            "base": { "sha": "def", "ref": "main" },
            "updated_at": "2026-02-18T12:00:00Z"
        },
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });
    let event: PullRequestEvent = serde_json::from_value(payload).expect("decode");
    assert_eq!(event.pull_request.head.sha, "abc");
    assert_eq!(event.pull_request.base.ref_name, "main");
}

#[test]
fn test_missing_required_field_fails_decode() {
    // No `issue` object: deterministic decode failure.
    let payload = serde_json::json!({
        "action": "opened",
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });
    assert!(serde_json::from_value::<IssuesEvent>(payload).is_err());
}

#[test]
fn test_unknown_fields_are_ignored() {
    let payload = serde_json::json!({
        "action": "created",
        "check_run": {
            "id": 42,
            "head_sha": "abc",
            "status": "completed",
            "conclusion": "failure",
            "some_future_field": { "nested": true }
        },
        "repository": {
            "id": 12345,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo" }
        }
    });
    let event: CheckRunEvent = serde_json::from_value(payload).expect("decode");
    assert_eq!(event.check_run.conclusion.as_deref(), Some("failure"));
}
