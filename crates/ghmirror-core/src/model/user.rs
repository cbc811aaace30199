//! GitHub account rows.

use crate::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// GitHub account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    User,
    Bot,
    Organization,
}

impl UserType {
    /// Lenient parse from the strings GitHub sends; unknown values default
    /// to `User`.
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            Some("Bot") => Self::Bot,
            Some("Organization") => Self::Organization,
            _ => Self::User,
        }
    }
}

/// One row per GitHub account referenced by any event, keyed by the numeric
/// id. Upserted before any domain row links to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub login: String,
    pub avatar_url: Option<String>,
    pub user_type: UserType,
    pub cached_at: Timestamp,
}
