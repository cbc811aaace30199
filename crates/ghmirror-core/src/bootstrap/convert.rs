//! REST response → domain row conversion for the bootstrap steps.
//!
//! Counterpart of the webhook mapping in `dispatch::writer`; REST shapes
//! differ slightly from webhook payloads, so the two converters stay
//! separate.

use crate::dispatch::writer::{parse_opt_ts, parse_ts};
use crate::model::*;
use crate::{MirrorResult, RepositoryId, Timestamp, UserId};
use ghmirror_github::*;

pub fn user_row(user: &ApiUser, now: Timestamp) -> User {
    User {
        user_id: UserId::new(user.id),
        login: user.login.clone(),
        avatar_url: user.avatar_url.clone(),
        user_type: UserType::from_api(user.user_type.as_deref()),
        cached_at: now,
    }
}

pub fn branch_row(repository_id: RepositoryId, branch: &ApiBranch, now: Timestamp) -> Branch {
    Branch {
        repository_id,
        name: branch.name.clone(),
        head_sha: branch.commit.sha.clone(),
        protected: branch.protected,
        updated_at: now,
    }
}

pub fn pull_row(
    repository_id: RepositoryId,
    pull: &ApiPull,
    now: Timestamp,
) -> MirrorResult<PullRequest> {
    Ok(PullRequest {
        repository_id,
        number: pull.number,
        github_pr_id: pull.id,
        title: pull.title.clone(),
        state: PrState::from_api(&pull.state),
        draft: pull.draft,
        author_user_id: pull.user.as_ref().map(|u| UserId::new(u.id)),
        author_login: pull.user.as_ref().map(|u| u.login.clone()),
        head_sha: pull.head.sha.clone(),
        head_ref_name: pull.head.ref_name.clone(),
        base_ref_name: pull.base.ref_name.clone(),
        mergeable_state: pull.mergeable_state.clone(),
        merged_at: parse_opt_ts(pull.merged_at.as_ref())?,
        closed_at: parse_opt_ts(pull.closed_at.as_ref())?,
        created_at: now,
        github_updated_at: Some(parse_ts(&pull.updated_at)?),
        optimistic: None,
    })
}

pub fn issue_row(
    repository_id: RepositoryId,
    issue: &ApiIssue,
    now: Timestamp,
) -> MirrorResult<Issue> {
    Ok(Issue {
        doc_id: new_doc_id(),
        repository_id,
        number: Some(issue.number),
        github_issue_id: Some(issue.id),
        state: IssueState::from_api(&issue.state),
        title: issue.title.clone(),
        body: issue.body.clone(),
        author_user_id: issue.user.as_ref().map(|u| UserId::new(u.id)),
        author_login: issue.user.as_ref().map(|u| u.login.clone()),
        label_names: issue.labels.iter().map(|l| l.name.clone()).collect(),
        assignee_user_ids: issue.assignees.iter().map(|u| UserId::new(u.id)).collect(),
        is_pull_request: issue.pull_request.is_some(),
        created_at: parse_opt_ts(issue.created_at.as_ref())?.unwrap_or(now),
        closed_at: parse_opt_ts(issue.closed_at.as_ref())?,
        github_updated_at: Some(parse_ts(&issue.updated_at)?),
        optimistic: None,
    })
}

pub fn commit_row(
    repository_id: RepositoryId,
    commit: &ApiCommit,
) -> MirrorResult<Commit> {
    Ok(Commit {
        repository_id,
        sha: commit.sha.clone(),
        message_headline: Commit::headline(&commit.commit.message),
        author_login: commit.author.as_ref().map(|u| u.login.clone()),
        author_user_id: commit.author.as_ref().map(|u| UserId::new(u.id)),
        authored_at: parse_opt_ts(
            commit
                .commit
                .author
                .as_ref()
                .and_then(|a| a.date.as_ref()),
        )?,
        committed_at: parse_opt_ts(
            commit
                .commit
                .committer
                .as_ref()
                .and_then(|a| a.date.as_ref()),
        )?,
    })
}

pub fn check_run_row(
    repository_id: RepositoryId,
    check: &ApiCheckRun,
) -> MirrorResult<CheckRun> {
    let started_at = parse_opt_ts(check.started_at.as_ref())?;
    let completed_at = parse_opt_ts(check.completed_at.as_ref())?;
    Ok(CheckRun {
        repository_id,
        github_check_run_id: check.id,
        name: check.name.clone(),
        head_sha: check.head_sha.clone(),
        status: check.status.clone(),
        conclusion: check.conclusion.clone(),
        started_at,
        completed_at,
        github_updated_at: completed_at.max(started_at),
    })
}

pub fn workflow_run_row(
    repository_id: RepositoryId,
    run: &ApiWorkflowRun,
) -> MirrorResult<WorkflowRun> {
    Ok(WorkflowRun {
        repository_id,
        github_run_id: run.id,
        workflow_name: run.name.clone(),
        head_sha: run.head_sha.clone(),
        head_branch: run.head_branch.clone(),
        status: run.status.clone(),
        conclusion: run.conclusion.clone(),
        run_number: run.run_number,
        github_updated_at: parse_opt_ts(run.updated_at.as_ref())?,
    })
}

pub fn workflow_job_row(
    repository_id: RepositoryId,
    job: &ApiWorkflowJob,
) -> MirrorResult<WorkflowJob> {
    Ok(WorkflowJob {
        repository_id,
        github_job_id: job.id,
        github_run_id: job.run_id,
        name: job.name.clone(),
        status: job.status.clone(),
        conclusion: job.conclusion.clone(),
        started_at: parse_opt_ts(job.started_at.as_ref())?,
        completed_at: parse_opt_ts(job.completed_at.as_ref())?,
    })
}

pub fn pull_file_row(
    repository_id: RepositoryId,
    pull_request_number: u64,
    head_sha: &str,
    file: &ApiPullFile,
) -> PullRequestFile {
    PullRequestFile {
        repository_id,
        pull_request_number,
        filename: file.filename.clone(),
        head_sha: head_sha.to_string(),
        status: file.status.clone(),
        additions: file.additions,
        deletions: file.deletions,
        patch: file.patch.clone(),
    }
}

pub fn review_row(
    repository_id: RepositoryId,
    pull_request_number: u64,
    review: &ApiReview,
) -> MirrorResult<PullRequestReview> {
    Ok(PullRequestReview {
        doc_id: new_doc_id(),
        repository_id,
        pull_request_number,
        github_review_id: Some(review.id),
        author_user_id: review.user.as_ref().map(|u| UserId::new(u.id)),
        author_login: review.user.as_ref().map(|u| u.login.clone()),
        state: review.state.clone(),
        body: review.body.clone(),
        submitted_at: parse_opt_ts(review.submitted_at.as_ref())?,
        commit_sha: review.commit_id.clone(),
        optimistic: None,
    })
}

pub fn review_comment_row(
    repository_id: RepositoryId,
    pull_request_number: u64,
    comment: &ApiReviewComment,
) -> MirrorResult<PullRequestReviewComment> {
    Ok(PullRequestReviewComment {
        repository_id,
        pull_request_number,
        github_comment_id: comment.id,
        author_user_id: comment.user.as_ref().map(|u| UserId::new(u.id)),
        author_login: comment.user.as_ref().map(|u| u.login.clone()),
        body: comment.body.clone(),
        path: comment.path.clone(),
        line: comment.line,
        side: comment.side.clone(),
        in_reply_to_github_review_comment_id: comment.in_reply_to_id,
        commit_sha: comment.commit_id.clone(),
        created_at: parse_ts(&comment.created_at)?,
        updated_at: parse_ts(&comment.updated_at)?,
    })
}

pub fn issue_comment_row(
    repository_id: RepositoryId,
    issue_number: u64,
    comment: &ApiIssueComment,
) -> MirrorResult<IssueComment> {
    Ok(IssueComment {
        doc_id: new_doc_id(),
        repository_id,
        issue_number,
        github_comment_id: Some(comment.id),
        author_user_id: comment.user.as_ref().map(|u| UserId::new(u.id)),
        author_login: comment.user.as_ref().map(|u| u.login.clone()),
        body: comment.body.clone(),
        created_at: parse_ts(&comment.created_at)?,
        updated_at: parse_ts(&comment.updated_at)?,
        optimistic: None,
    })
}
