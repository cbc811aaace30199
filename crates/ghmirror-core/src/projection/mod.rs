//! Derived views: the repo overview projection and paginated reads.

use crate::model::RepoOverview;
use crate::services::Services;
use crate::{MirrorResult, RepositoryId, Timestamp};
use tracing::debug;

pub mod queries;

pub use queries::ListQueries;

/// Rebuilds the per-repository overview after domain writes.
///
/// Counts come from the store's aggregate indexes — never a table scan —
/// so a rebuild is cheap enough to run after every dispatch. Rebuilds are
/// idempotent: concurrent rebuilds for one repository converge on the same
/// counters.
pub struct ProjectionBuilder {
    services: Services,
}

impl ProjectionBuilder {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Recompute the overview row. `last_push_hint` carries the push time
    /// observed by a push handler; the stored value only moves forward.
    pub async fn rebuild(
        &self,
        repository_id: RepositoryId,
        last_push_hint: Option<Timestamp>,
    ) -> MirrorResult<()> {
        let counts = self.services.store.repo_counts(repository_id).await?;
        let existing = self.services.store.get_overview(repository_id).await?;
        let last_push_at = existing
            .as_ref()
            .and_then(|o| o.last_push_at)
            .max(last_push_hint);

        let overview = RepoOverview {
            repository_id,
            open_pr_count: counts.open_pr_count,
            open_issue_count: counts.open_issue_count,
            failing_check_count: counts.failing_check_count,
            last_push_at,
            updated_at: self.services.now(),
        };
        debug!(
            %repository_id,
            open_prs = overview.open_pr_count,
            open_issues = overview.open_issue_count,
            failing_checks = overview.failing_check_count,
            "overview rebuilt"
        );
        self.services.store.put_overview(overview).await?;
        Ok(())
    }

    /// Read the overview, computing a fresh one when none is stored yet.
    pub async fn overview(&self, repository_id: RepositoryId) -> MirrorResult<RepoOverview> {
        if let Some(overview) = self.services.store.get_overview(repository_id).await? {
            return Ok(overview);
        }
        let counts = self.services.store.repo_counts(repository_id).await?;
        Ok(RepoOverview {
            repository_id,
            open_pr_count: counts.open_pr_count,
            open_issue_count: counts.open_issue_count,
            failing_check_count: counts.failing_check_count,
            last_push_at: None,
            updated_at: self.services.now(),
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
