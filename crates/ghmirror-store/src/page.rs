//! Cursor-based pagination envelope.
//!
//! Every list query in gh-mirror returns a [`Page`]: the rows for this call,
//! a continuation cursor, and a done flag. Callers feed `continue_cursor`
//! back verbatim; the format is an implementation detail and may change.

use serde::{Deserialize, Serialize};

/// One page of a cursor-based read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows in this page, in query order.
    pub page: Vec<T>,

    /// `true` when iteration has visited every matching row.
    pub is_done: bool,

    /// Opaque cursor to resume from. Present even on the final page so a
    /// poller can re-issue the query and pick up rows appended later.
    pub continue_cursor: String,
}

impl<T> Page<T> {
    /// An empty, completed page.
    pub fn empty() -> Self {
        Self {
            page: Vec::new(),
            is_done: true,
            continue_cursor: Cursor::start().encode(),
        }
    }

    /// Map the row type while keeping the pagination envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            page: self.page.into_iter().map(f).collect(),
            is_done: self.is_done,
            continue_cursor: self.continue_cursor,
        }
    }
}

/// Decoded form of the opaque continuation cursor.
///
/// Encodes the last-visited sort key plus a tie-break id. An unparsable
/// cursor decodes to [`Cursor::start`], restarting iteration — safe for an
/// at-least-once read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Sort key of the last row the caller has seen.
    pub sort_key: i64,

    /// Tie-break identifier of that row (unique within the index).
    pub tie_break: String,
}

impl Cursor {
    /// Cursor positioned before the first row.
    pub fn start() -> Self {
        Self {
            sort_key: i64::MIN,
            tie_break: String::new(),
        }
    }

    /// Cursor positioned after the given row.
    pub fn after(sort_key: i64, tie_break: impl Into<String>) -> Self {
        Self {
            sort_key,
            tie_break: tie_break.into(),
        }
    }

    /// Render the opaque wire form.
    pub fn encode(&self) -> String {
        format!("{}#{}", self.sort_key, self.tie_break)
    }

    /// Parse a wire cursor, restarting from the beginning when malformed or
    /// absent.
    pub fn decode(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::start();
        };
        match raw.split_once('#') {
            Some((key, tie)) => match key.parse::<i64>() {
                Ok(sort_key) => Self::after(sort_key, tie),
                Err(_) => Self::start(),
            },
            None => Self::start(),
        }
    }

    /// Whether `candidate` sorts strictly after this cursor position.
    pub fn admits(&self, sort_key: i64, tie_break: &str) -> bool {
        (sort_key, tie_break) > (self.sort_key, self.tie_break.as_str())
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
