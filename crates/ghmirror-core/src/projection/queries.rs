//! Cursor-paginated list queries for PRs, issues, and activity.
//!
//! Callers supply an optional opaque cursor and a page size and get back
//! `{page, is_done, continue_cursor}`. A malformed cursor restarts from the
//! beginning, which is safe for this at-least-once read model.

use crate::model::{ActivityEntry, Issue, IssueState, PrState, PullRequest};
use crate::services::Services;
use crate::{MirrorResult, RepositoryId};
use ghmirror_store::{Cursor, Page};

/// Server-side clamp on page sizes.
const MAX_PAGE_SIZE: usize = 100;

/// Read-side query service.
pub struct ListQueries {
    services: Services,
}

impl ListQueries {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    fn clamp(num_items: usize) -> usize {
        num_items.clamp(1, MAX_PAGE_SIZE)
    }

    pub async fn pull_requests(
        &self,
        repository_id: RepositoryId,
        state: Option<PrState>,
        cursor: Option<&str>,
        num_items: usize,
    ) -> MirrorResult<Page<PullRequest>> {
        Ok(self
            .services
            .store
            .page_pull_requests(
                repository_id,
                state,
                Cursor::decode(cursor),
                Self::clamp(num_items),
            )
            .await?)
    }

    pub async fn issues(
        &self,
        repository_id: RepositoryId,
        state: Option<IssueState>,
        cursor: Option<&str>,
        num_items: usize,
    ) -> MirrorResult<Page<Issue>> {
        Ok(self
            .services
            .store
            .page_issues(
                repository_id,
                state,
                Cursor::decode(cursor),
                Self::clamp(num_items),
            )
            .await?)
    }

    pub async fn activity(
        &self,
        repository_id: RepositoryId,
        cursor: Option<&str>,
        num_items: usize,
    ) -> MirrorResult<Page<ActivityEntry>> {
        Ok(self
            .services
            .store
            .page_activity(repository_id, Cursor::decode(cursor), Self::clamp(num_items))
            .await?)
    }
}

#[cfg(test)]
#[path = "queries_tests.rs"]
mod tests;
