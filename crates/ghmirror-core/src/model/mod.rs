//! Normalized domain rows.
//!
//! One struct per stored table. Rows are plain serde-able values; all
//! invariants (dedup keys, out-of-order guards, optimistic-state
//! monotonicity) are enforced by the store's conditional upserts, so a row
//! in hand is just data.

pub mod activity;
pub mod checks;
pub mod git;
pub mod installation;
pub mod issue;
pub mod optimistic;
pub mod pull_request;
pub mod raw_event;
pub mod repository;
pub mod sync_job;
pub mod user;

pub use activity::{ActivityEntry, RepoOverview};
pub use checks::{CheckRun, WorkflowJob, WorkflowRun};
pub use git::{Branch, Commit};
pub use installation::{AccountType, Installation};
pub use issue::{Issue, IssueComment, IssueState};
pub use optimistic::{OptimisticMeta, OptimisticOperation, OptimisticWriteState};
pub use pull_request::{
    PrState, PullRequest, PullRequestFile, PullRequestReview, PullRequestReviewComment,
};
pub use raw_event::{DeadLetter, DeadLetterSource, ProcessState, RawEvent};
pub use repository::{Repository, Visibility};
pub use sync_job::{JobState, JobType, LockKey, ScopeType, SyncJob};
pub use user::{User, UserType};

/// System-assigned document id for rows whose natural key may be unknown at
/// insert time (optimistic stubs). ULIDs sort by creation time, which the
/// list cursors use as a tie-break.
pub fn new_doc_id() -> String {
    ulid::Ulid::new().to_string()
}
