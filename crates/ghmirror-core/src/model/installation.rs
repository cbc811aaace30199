//! Connected GitHub account rows.

use crate::{InstallationId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Account type behind an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Organization,
}

/// One row per connected GitHub account.
///
/// The id is opaque: app-mode deployments get real installation ids from
/// GitHub, repo-webhook deployments mint local ones. Nothing in the
/// pipeline compares against particular values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub installation_id: InstallationId,
    pub account_id: UserId,
    pub account_login: String,
    pub account_type: AccountType,
    pub suspended: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
