use serde::Deserialize;

use crate::models::JiraUser;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Issue {
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IssueFields {
    #[serde(default)]
    pub issuetype: Option<IssueType>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IssueType {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl Issue {
    pub fn issue_type_name(&self) -> String {
        self.fields
            .issuetype
            .as_ref()
            .and_then(|issue_type| issue_type.name.clone())
            .unwrap_or_default()
    }

    pub fn assignee_login(&self) -> Option<String> {
        self.fields.assignee.as_ref().and_then(JiraUser::login)
    }
}
