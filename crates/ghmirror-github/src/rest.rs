//! `reqwest`-backed [`GithubApi`] implementation.
//!
//! Status mapping follows the mirror's retry policy: 5xx and connection
//! failures are transient, 403/429 with rate-limit markers become
//! [`ApiError::RateLimited`] carrying the `Retry-After` hint, and 4xx
//! validation failures are permanent.

use crate::error::ApiError;
use crate::pagination::{next_page_from_link, Paged};
use crate::token::AccessToken;
use crate::types::*;
use crate::GithubApi;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const PER_PAGE: u32 = 100;
const API_VERSION: &str = "2022-11-28";

/// Production GitHub REST client.
pub struct RestGithub {
    http: reqwest::Client,
    base_url: Url,
}

impl RestGithub {
    /// Build a client against `base_url` (normally `https://api.github.com`).
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gh-mirror"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::Network {
            message: format!("invalid endpoint path '{}': {}", path, e),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: &AccessToken,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token.expose())
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;
        Self::check_status(path, response).await
    }

    /// Map non-success statuses into the error taxonomy.
    async fn check_status(path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");
        let message = response.text().await.unwrap_or_default();
        let message = message.chars().take(512).collect::<String>();

        debug!(%path, status = status.as_u16(), "GitHub request failed");

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after },
            StatusCode::FORBIDDEN if retry_after.is_some() || rate_limit_exhausted => {
                ApiError::RateLimited { retry_after }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth { message },
            StatusCode::NOT_FOUND => ApiError::NotFound {
                resource: path.to_string(),
            },
            s if s.is_server_error() => ApiError::Upstream {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Rejected {
                status: s.as_u16(),
                message,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response.json().await.map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }

    /// GET one page of a Link-header paginated listing.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        extra_query: &[(&str, String)],
        page: u32,
    ) -> Result<Paged<T>, ApiError> {
        let mut query: Vec<(&str, String)> = vec![
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        query.extend(extra_query.iter().cloned());

        let response = self.send(Method::GET, path, token, &query, None).await?;
        let next_page = next_page_from_link(
            response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok()),
        );
        let items = Self::decode(response).await?;
        Ok(Paged { items, next_page })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, token, query, None).await?;
        Self::decode(response).await
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        token: &AccessToken,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, token, &[], Some(body)).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl GithubApi for RestGithub {
    #[instrument(skip(self, token))]
    async fn get_repo(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
    ) -> Result<ApiRepo, ApiError> {
        self.get_json(token, &format!("repos/{}/{}", owner, repo), &[])
            .await
    }

    async fn list_branches(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiBranch>, ApiError> {
        self.get_paged(token, &format!("repos/{}/{}/branches", owner, repo), &[], page)
            .await
    }

    async fn list_pulls(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiPull>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/pulls", owner, repo),
            &[
                ("state", "all".to_string()),
                ("sort", "updated".to_string()),
                ("direction", "desc".to_string()),
            ],
            page,
        )
        .await
    }

    async fn list_issues(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiIssue>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/issues", owner, repo),
            &[
                ("state", "all".to_string()),
                ("sort", "updated".to_string()),
                ("direction", "desc".to_string()),
            ],
            page,
        )
        .await
    }

    async fn list_commits(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        ref_name: &str,
        page: u32,
    ) -> Result<Paged<ApiCommit>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/commits", owner, repo),
            &[("sha", ref_name.to_string())],
            page,
        )
        .await
    }

    async fn list_check_runs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        ref_name: &str,
    ) -> Result<Vec<ApiCheckRun>, ApiError> {
        let list: ApiCheckRunList = self
            .get_json(
                token,
                &format!("repos/{}/{}/commits/{}/check-runs", owner, repo, ref_name),
                &[("per_page", PER_PAGE.to_string())],
            )
            .await?;
        Ok(list.check_runs)
    }

    async fn list_workflow_runs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiWorkflowRun>, ApiError> {
        let path = format!("repos/{}/{}/actions/runs", owner, repo);
        let query = [
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.send(Method::GET, &path, token, &query, None).await?;
        let next_page = next_page_from_link(
            response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok()),
        );
        let list: ApiWorkflowRunList = Self::decode(response).await?;
        Ok(Paged {
            items: list.workflow_runs,
            next_page,
        })
    }

    async fn list_workflow_jobs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        run_id: u64,
        page: u32,
    ) -> Result<Paged<ApiWorkflowJob>, ApiError> {
        let path = format!("repos/{}/{}/actions/runs/{}/jobs", owner, repo, run_id);
        let query = [
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.send(Method::GET, &path, token, &query, None).await?;
        let next_page = next_page_from_link(
            response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok()),
        );
        let list: ApiWorkflowJobList = Self::decode(response).await?;
        Ok(Paged {
            items: list.jobs,
            next_page,
        })
    }

    async fn list_pull_files(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiPullFile>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/pulls/{}/files", owner, repo, number),
            &[],
            page,
        )
        .await
    }

    async fn list_pull_reviews(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReview>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/pulls/{}/reviews", owner, repo, number),
            &[],
            page,
        )
        .await
    }

    async fn list_review_comments(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReviewComment>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/pulls/{}/comments", owner, repo, number),
            &[],
            page,
        )
        .await
    }

    async fn list_issue_comments(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiIssueComment>, ApiError> {
        self.get_paged(
            token,
            &format!("repos/{}/{}/issues/{}/comments", owner, repo, number),
            &[],
            page,
        )
        .await
    }

    #[instrument(skip(self, token, body))]
    async fn create_issue(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
    ) -> Result<ApiIssue, ApiError> {
        self.call_json(
            Method::POST,
            token,
            &format!("repos/{}/{}/issues", owner, repo),
            serde_json::json!({ "title": title, "body": body }),
        )
        .await
    }

    async fn create_issue_comment(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<ApiIssueComment, ApiError> {
        self.call_json(
            Method::POST,
            token,
            &format!("repos/{}/{}/issues/{}/comments", owner, repo, number),
            serde_json::json!({ "body": body }),
        )
        .await
    }

    async fn update_issue_state(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        state: &str,
    ) -> Result<ApiIssue, ApiError> {
        self.call_json(
            Method::PATCH,
            token,
            &format!("repos/{}/{}/issues/{}", owner, repo, number),
            serde_json::json!({ "state": state }),
        )
        .await
    }

    async fn merge_pull(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        method: Option<&str>,
    ) -> Result<ApiMergeResult, ApiError> {
        let mut body = serde_json::Map::new();
        if let Some(method) = method {
            body.insert("merge_method".to_string(), method.into());
        }
        self.call_json(
            Method::PUT,
            token,
            &format!("repos/{}/{}/pulls/{}/merge", owner, repo, number),
            serde_json::Value::Object(body),
        )
        .await
    }

    async fn update_pull_branch(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        expected_head_sha: &str,
    ) -> Result<(), ApiError> {
        // 202 Accepted with a status message body; the content is not needed.
        self.send(
            Method::PUT,
            &format!("repos/{}/{}/pulls/{}/update-branch", owner, repo, number),
            token,
            &[],
            Some(serde_json::json!({ "expected_head_sha": expected_head_sha })),
        )
        .await?;
        Ok(())
    }

    async fn submit_review(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        event: &str,
        body: Option<&str>,
    ) -> Result<ApiReview, ApiError> {
        self.call_json(
            Method::POST,
            token,
            &format!("repos/{}/{}/pulls/{}/reviews", owner, repo, number),
            serde_json::json!({ "event": event, "body": body }),
        )
        .await
    }

    async fn set_labels(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<Vec<ApiLabel>, ApiError> {
        self.call_json(
            Method::PUT,
            token,
            &format!("repos/{}/{}/issues/{}/labels", owner, repo, number),
            serde_json::json!({ "labels": labels }),
        )
        .await
    }

    async fn add_assignees(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        assignees: &[String],
    ) -> Result<ApiIssue, ApiError> {
        self.call_json(
            Method::POST,
            token,
            &format!("repos/{}/{}/issues/{}/assignees", owner, repo, number),
            serde_json::json!({ "assignees": assignees }),
        )
        .await
    }

    async fn remove_assignees(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        assignees: &[String],
    ) -> Result<ApiIssue, ApiError> {
        self.call_json(
            Method::DELETE,
            token,
            &format!("repos/{}/{}/issues/{}/assignees", owner, repo, number),
            serde_json::json!({ "assignees": assignees }),
        )
        .await
    }

    async fn create_hook(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        callback_url: &str,
        secret: &str,
    ) -> Result<u64, ApiError> {
        let hook: ApiHook = self
            .call_json(
                Method::POST,
                token,
                &format!("repos/{}/{}/hooks", owner, repo),
                serde_json::json!({
                    "name": "web",
                    "active": true,
                    "events": ["*"],
                    "config": {
                        "url": callback_url,
                        "content_type": "json",
                        "secret": secret,
                    },
                }),
            )
            .await?;
        Ok(hook.id)
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
