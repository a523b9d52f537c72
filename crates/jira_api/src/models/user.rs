//! User references embedded in issues, worklogs and comments.

use serde::Deserialize;

/// Represents a Jira user reference. Server deployments identify users by `name`/`key`, cloud deployments by `accountId`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    pub name: Option<String>,
    pub key: Option<String>,
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
}

impl JiraUser {
    /// Returns the best available login identifier for the user.
    pub fn login(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.key.clone())
            .or_else(|| self.account_id.clone())
    }
}
