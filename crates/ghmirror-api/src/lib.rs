//! # gh-mirror HTTP API
//!
//! The HTTP surface over the mirror core:
//!
//! - `POST /api/github/webhook` — signature-verified webhook gateway;
//! - read queries (overview, PRs, issues, activity) with opaque cursors;
//! - optimistic write endpoints, each taking a client correlation id;
//! - repository connect;
//! - the admin surface: failed raw events, dead letters, replay-one,
//!   retry-all-failed, reconcile-repo;
//! - health and readiness probes.
//!
//! Handlers are thin: extract, call into `ghmirror-core`, map errors to
//! statuses. Callers are identified by the opaque `X-Caller-Id` header —
//! authentication happens upstream of this service.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use bytes::Bytes;
use ghmirror_core::bootstrap::{BootstrapGate, ConnectService};
use ghmirror_core::ingest::{EventProcessor, Gateway, IntakeOutcome};
use ghmirror_core::model::{IssueState, PrState, ProcessState};
use ghmirror_core::optimistic::OptimisticCoordinator;
use ghmirror_core::projection::{ListQueries, ProjectionBuilder};
use ghmirror_core::{
    CorrelationId, DeliveryId, MirrorError, RepositoryId, Services, UserId,
};
use ghmirror_workflow::WorkflowEngine;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::instrument;

pub mod config;
pub mod errors;
pub mod responses;
pub mod signature;

pub use config::ServiceConfig;
pub use errors::{ConfigError, HttpError};
pub use signature::WebhookSecret;

use responses::*;

/// Default page size when the caller does not specify `num_items`.
const DEFAULT_PAGE_SIZE: usize = 50;

// ============================================================================
// Application state
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub gateway: Arc<Gateway>,
    pub processor: Arc<EventProcessor>,
    pub coordinator: Arc<OptimisticCoordinator>,
    pub gate: BootstrapGate,
    pub connect: Arc<ConnectService>,
    pub queries: Arc<ListQueries>,
    pub projections: Arc<ProjectionBuilder>,
    pub secret: Arc<WebhookSecret>,
}

impl AppState {
    /// Wire the full pipeline over a services bundle and workflow engine.
    pub fn new(
        services: Services,
        engine: Arc<dyn WorkflowEngine>,
        secret: WebhookSecret,
    ) -> Self {
        let secret = Arc::new(secret);
        let gate = BootstrapGate::new(services.clone(), engine);
        let connect = Arc::new(ConnectService::new(
            services.clone(),
            gate.clone(),
            secret.expose().to_string(),
        ));
        Self {
            gateway: Arc::new(Gateway::new(services.clone())),
            processor: Arc::new(EventProcessor::new(services.clone())),
            coordinator: Arc::new(OptimisticCoordinator::new(services.clone())),
            queries: Arc::new(ListQueries::new(services.clone())),
            projections: Arc::new(ProjectionBuilder::new(services.clone())),
            gate,
            connect,
            services,
            secret,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/github/webhook", post(handle_webhook))
        .route("/api/repos/connect", post(handle_connect))
        .route("/api/repos/:repo_id/overview", get(get_overview))
        .route("/api/repos/:repo_id/pulls", get(list_pull_requests))
        .route(
            "/api/repos/:repo_id/issues",
            get(list_issues).post(create_issue),
        )
        .route("/api/repos/:repo_id/activity", get(list_activity))
        .route(
            "/api/repos/:repo_id/issues/:number/comments",
            post(create_comment),
        )
        .route(
            "/api/repos/:repo_id/issues/:number/state",
            put(update_issue_state),
        )
        .route(
            "/api/repos/:repo_id/issues/:number/labels",
            put(update_labels),
        )
        .route(
            "/api/repos/:repo_id/issues/:number/assignees",
            put(update_assignees),
        )
        .route(
            "/api/repos/:repo_id/pulls/:number/merge",
            post(merge_pull_request),
        )
        .route(
            "/api/repos/:repo_id/pulls/:number/update-branch",
            post(update_pull_request_branch),
        )
        .route(
            "/api/repos/:repo_id/pulls/:number/reviews",
            post(submit_pr_review),
        );

    let admin_routes = Router::new()
        .route("/admin/raw-events/failed", get(list_failed_events))
        .route("/admin/dead-letters", get(list_dead_letters))
        .route(
            "/admin/raw-events/:delivery_id/replay",
            post(replay_event),
        )
        .route("/admin/raw-events/retry-all", post(retry_all_failed))
        .route("/admin/repos/:repo_id/reconcile", post(reconcile_repo));

    let health_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready));

    Router::new()
        .merge(api_routes)
        .merge(admin_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

// ============================================================================
// Extraction helpers
// ============================================================================

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn caller_from(headers: &HeaderMap) -> Result<UserId, HttpError> {
    header_str(headers, "x-caller-id")
        .and_then(|v| v.parse::<u64>().ok())
        .map(UserId::new)
        .ok_or_else(|| HttpError::bad_request("missing or malformed X-Caller-Id header"))
}

fn correlation(raw: &str) -> Result<CorrelationId, HttpError> {
    CorrelationId::new(raw).map_err(|e| HttpError::from(MirrorError::Validation(e)))
}

/// Common list-query parameters.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub state: Option<String>,
    pub cursor: Option<String>,
    pub num_items: Option<usize>,
}

impl ListParams {
    fn num_items(&self) -> usize {
        self.num_items.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn pr_state(&self) -> Result<Option<PrState>, HttpError> {
        match self.state.as_deref() {
            None => Ok(None),
            Some("open") => Ok(Some(PrState::Open)),
            Some("closed") => Ok(Some(PrState::Closed)),
            Some(other) => Err(HttpError::bad_request(format!(
                "unknown state filter '{}'",
                other
            ))),
        }
    }

    fn issue_state(&self) -> Result<Option<IssueState>, HttpError> {
        match self.state.as_deref() {
            None => Ok(None),
            Some("open") => Ok(Some(IssueState::Open)),
            Some("closed") => Ok(Some(IssueState::Closed)),
            Some(other) => Err(HttpError::bad_request(format!(
                "unknown state filter '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Webhook gateway
// ============================================================================

/// `POST /api/github/webhook`
///
/// 200 on intake or idempotent duplicate, 400 for missing headers or
/// malformed JSON, 401 for a signature mismatch, 500 only for store
/// failures.
#[instrument(skip_all)]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, HttpError> {
    let event_name = header_str(&headers, "x-github-event")
        .ok_or_else(|| HttpError::bad_request("missing X-GitHub-Event header"))?
        .to_string();
    let delivery_id = header_str(&headers, "x-github-delivery")
        .ok_or_else(|| HttpError::bad_request("missing X-GitHub-Delivery header"))
        .and_then(|raw| {
            DeliveryId::new(raw).map_err(|e| HttpError::from(MirrorError::Validation(e)))
        })?;
    let signature = header_str(&headers, "x-hub-signature-256")
        .ok_or_else(|| HttpError::bad_request("missing X-Hub-Signature-256 header"))?;

    // Verify against the raw bytes before anything is persisted as valid.
    let signature_valid = state.secret.verify(&body, signature);
    let payload = String::from_utf8(body.to_vec())
        .map_err(|_| HttpError::bad_request("webhook body is not valid UTF-8"))?;

    let outcome = state
        .gateway
        .intake(delivery_id.clone(), &event_name, payload, signature_valid)
        .await?;
    match outcome {
        IntakeOutcome::Accepted => Ok(Json(WebhookAck {
            status: "accepted",
            delivery_id: delivery_id.as_str().to_string(),
        })),
        IntakeOutcome::Duplicate => Ok(Json(WebhookAck {
            status: "duplicate",
            delivery_id: delivery_id.as_str().to_string(),
        })),
        IntakeOutcome::SignatureRejected => {
            Err(HttpError::unauthorized("webhook signature mismatch"))
        }
    }
}

// ============================================================================
// Connect & reads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub full_name: String,
}

pub async fn handle_connect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state.connect.connect_repo(&request.full_name, caller).await?;
    Ok(Json(outcome.into()))
}

pub async fn get_overview(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
) -> Result<Json<ghmirror_core::model::RepoOverview>, HttpError> {
    let overview = state
        .projections
        .overview(RepositoryId::new(repo_id))
        .await?;
    Ok(Json(overview))
}

pub async fn list_pull_requests(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
    Query(params): Query<ListParams>,
) -> Result<Json<ghmirror_store::Page<ghmirror_core::model::PullRequest>>, HttpError> {
    let page = state
        .queries
        .pull_requests(
            RepositoryId::new(repo_id),
            params.pr_state()?,
            params.cursor.as_deref(),
            params.num_items(),
        )
        .await?;
    Ok(Json(page))
}

pub async fn list_issues(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
    Query(params): Query<ListParams>,
) -> Result<Json<ghmirror_store::Page<ghmirror_core::model::Issue>>, HttpError> {
    let page = state
        .queries
        .issues(
            RepositoryId::new(repo_id),
            params.issue_state()?,
            params.cursor.as_deref(),
            params.num_items(),
        )
        .await?;
    Ok(Json(page))
}

pub async fn list_activity(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
    Query(params): Query<ListParams>,
) -> Result<Json<ghmirror_store::Page<ghmirror_core::model::ActivityEntry>>, HttpError> {
    let page = state
        .queries
        .activity(
            RepositoryId::new(repo_id),
            params.cursor.as_deref(),
            params.num_items(),
        )
        .await?;
    Ok(Json(page))
}

// ============================================================================
// Optimistic writes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub correlation_id: String,
    pub title: String,
}

pub async fn create_issue(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<CreateIssueRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .create_issue(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            request.title,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub correlation_id: String,
    pub body: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .create_comment(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.body,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueStateRequest {
    pub correlation_id: String,
    pub state: String,
}

pub async fn update_issue_state(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<UpdateIssueStateRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let issue_state = match request.state.as_str() {
        "open" => IssueState::Open,
        "closed" => IssueState::Closed,
        other => {
            return Err(HttpError::bad_request(format!(
                "unknown issue state '{}'",
                other
            )))
        }
    };
    let outcome = state
        .coordinator
        .update_issue_state(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            issue_state,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub correlation_id: String,
    pub method: Option<String>,
}

pub async fn merge_pull_request(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<MergeRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .merge_pull_request(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.method,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    pub correlation_id: String,
    pub expected_head_sha: String,
}

pub async fn update_pull_request_branch(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<UpdateBranchRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .update_pull_request_branch(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.expected_head_sha,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub correlation_id: String,
    pub event: String,
    pub body: Option<String>,
}

pub async fn submit_pr_review(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .submit_pr_review(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.event,
            request.body,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateLabelsRequest {
    pub correlation_id: String,
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

pub async fn update_labels(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<UpdateLabelsRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .update_labels(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.add,
            request.remove,
        )
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssigneesRequest {
    pub correlation_id: String,
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

pub async fn update_assignees(
    State(state): State<AppState>,
    Path((repo_id, number)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<UpdateAssigneesRequest>,
) -> Result<Json<OptimisticResponse>, HttpError> {
    let caller = caller_from(&headers)?;
    let outcome = state
        .coordinator
        .update_assignees(
            RepositoryId::new(repo_id),
            caller,
            correlation(&request.correlation_id)?,
            number,
            request.add,
            request.remove,
        )
        .await?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// Admin surface
// ============================================================================

pub async fn list_failed_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<RawEventSummary>>, HttpError> {
    let events = state
        .services
        .store
        .list_raw_events_by_state(ProcessState::Failed, 100)
        .await
        .map_err(MirrorError::from)?;
    Ok(Json(events.into_iter().map(RawEventSummary::from).collect()))
}

pub async fn list_dead_letters(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeadLetterSummary>>, HttpError> {
    let letters = state
        .services
        .store
        .list_dead_letters(100)
        .await
        .map_err(MirrorError::from)?;
    Ok(Json(
        letters.into_iter().map(DeadLetterSummary::from).collect(),
    ))
}

pub async fn replay_event(
    State(state): State<AppState>,
    Path(delivery_id): Path<String>,
) -> Result<Json<ReplayResponse>, HttpError> {
    let delivery_id = DeliveryId::new(delivery_id)
        .map_err(|e| HttpError::from(MirrorError::Validation(e)))?;
    let replayed = state.processor.replay_delivery(&delivery_id).await?;
    if !replayed {
        return Err(HttpError::not_found(format!(
            "no resettable raw event for delivery {}",
            delivery_id
        )));
    }
    Ok(Json(ReplayResponse { replayed }))
}

pub async fn retry_all_failed(
    State(state): State<AppState>,
) -> Result<Json<RetryAllResponse>, HttpError> {
    let reset = state.processor.retry_all_failed().await?;
    Ok(Json(RetryAllResponse { reset }))
}

pub async fn reconcile_repo(
    State(state): State<AppState>,
    Path(repo_id): Path<u64>,
) -> Result<Json<ConnectResponse>, HttpError> {
    let outcome = state
        .connect
        .reconcile_repo(RepositoryId::new(repo_id), "admin reconcile")
        .await?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn handle_ready(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    // Readiness is a cheap store round-trip.
    state
        .services
        .store
        .count_raw_events_by_state(ProcessState::Pending)
        .await
        .map_err(MirrorError::from)?;
    Ok(Json(HealthResponse { status: "ready" }))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
