//! Out-of-band pull request detail sync.
//!
//! Runs from the scheduler (queued by bootstrap step 8 and by
//! `pull_request` opened/synchronize events): fetches the file diff set —
//! keyed by the PR's current head SHA — plus reviews and conversation
//! comments.

use crate::bootstrap::convert;
use crate::services::Services;
use crate::store::UpsertOutcome;
use crate::{MirrorError, MirrorResult, RepositoryId};
use ghmirror_github::TokenScope;
use tracing::{debug, info, instrument};

/// Sync files, reviews, and comments for one pull request.
#[instrument(skip(services), fields(%repository_id, pull_number))]
pub async fn sync_pull_request_details(
    services: &Services,
    repository_id: RepositoryId,
    pull_number: u64,
) -> MirrorResult<()> {
    let repo = services
        .store
        .get_repository(repository_id)
        .await?
        .ok_or(MirrorError::NotFound {
            entity: "repository",
            key: repository_id.to_string(),
        })?;
    let Some(pull) = services
        .store
        .get_pull_request(repository_id, pull_number)
        .await?
    else {
        debug!("pull request no longer in store, nothing to sync");
        return Ok(());
    };

    let scope = TokenScope {
        installation_id: repo.installation_id.map(|i| i.as_u64()),
        connected_by_user_id: repo.connected_by_user_id.map(|u| u.as_u64()),
    };
    let token = services
        .tokens
        .resolve(&scope)
        .await
        .map_err(|err| MirrorError::UpstreamRejected {
            status: Some(401),
            message: format!("no token source for file sync: {}", err),
        })?;
    let now = services.now();

    // File diff set, replaced wholesale under head-SHA identity.
    let mut files = Vec::new();
    let mut page = Some(1u32);
    while let Some(current) = page {
        let batch = services
            .github
            .list_pull_files(&token, &repo.owner_login, &repo.name, pull_number, current)
            .await?;
        files.extend(
            batch
                .items
                .iter()
                .map(|f| convert::pull_file_row(repository_id, pull_number, &pull.head_sha, f)),
        );
        page = batch.next_page;
    }
    let file_count = files.len();
    let outcome = services
        .store
        .replace_pull_request_files(repository_id, pull_number, &pull.head_sha, files)
        .await?;
    if outcome == UpsertOutcome::StaleSkipped {
        debug!(head_sha = %pull.head_sha, "file set already current for this head");
    }

    // Reviews.
    let mut page = Some(1u32);
    while let Some(current) = page {
        let batch = services
            .github
            .list_pull_reviews(&token, &repo.owner_login, &repo.name, pull_number, current)
            .await?;
        for review in &batch.items {
            if let Some(user) = &review.user {
                services
                    .store
                    .upsert_user(convert::user_row(user, now))
                    .await?;
            }
            let row = convert::review_row(repository_id, pull_number, review)?;
            services.store.upsert_review(row, now).await?;
        }
        page = batch.next_page;
    }

    // Inline review comments.
    let mut page = Some(1u32);
    while let Some(current) = page {
        let batch = services
            .github
            .list_review_comments(&token, &repo.owner_login, &repo.name, pull_number, current)
            .await?;
        for comment in &batch.items {
            if let Some(user) = &comment.user {
                services
                    .store
                    .upsert_user(convert::user_row(user, now))
                    .await?;
            }
            let row = convert::review_comment_row(repository_id, pull_number, comment)?;
            services.store.upsert_review_comment(row).await?;
        }
        page = batch.next_page;
    }

    // Conversation comments (issue-comment endpoint shares the number).
    let mut page = Some(1u32);
    while let Some(current) = page {
        let batch = services
            .github
            .list_issue_comments(&token, &repo.owner_login, &repo.name, pull_number, current)
            .await?;
        for comment in &batch.items {
            if let Some(user) = &comment.user {
                services
                    .store
                    .upsert_user(convert::user_row(user, now))
                    .await?;
            }
            let row = convert::issue_comment_row(repository_id, pull_number, comment)?;
            services.store.upsert_issue_comment(row, now).await?;
        }
        page = batch.next_page;
    }

    info!(file_count, "pull request details synced");
    Ok(())
}
