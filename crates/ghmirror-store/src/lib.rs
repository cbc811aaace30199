//! # gh-mirror store primitives
//!
//! Building blocks shared by every store implementation in the gh-mirror
//! workspace:
//!
//! - [`StoreError`] — the error surface a document store exposes to callers.
//! - [`Aggregate`] — an order-statistic multiset answering range counts in
//!   O(log n), backing the hot projection counters.
//! - [`Page`] / [`Cursor`] — cursor-based pagination envelope used by every
//!   list query.
//! - [`Scheduler`] — the `run_after` contract with at-least-once execution,
//!   plus a tokio-backed implementation and a manual one for tests.
//!
//! The typed store contract itself (`MetadataStore`) lives in
//! `ghmirror-core`, which layers the domain tables on top of these
//! primitives.

pub mod aggregate;
pub mod error;
pub mod page;
pub mod scheduler;

pub use aggregate::Aggregate;
pub use error::StoreError;
pub use page::{Cursor, Page};
pub use scheduler::{
    ManualScheduler, ScheduledTask, Scheduler, SchedulerError, TaskSink, TokioScheduler,
};
