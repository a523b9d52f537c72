//! Flattens a JQL scope into the worklog, comment and issue records consumed by timesheet reconciliation.

use log::{debug, info};

use crate::client::JiraClient;
use crate::error::Result;
use crate::models::{Comment, Issue, JiraUser, Worklog};

/// One logged time span on an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct WorklogRecord {
    pub author: String,
    pub started: String,
    pub time_spent: u64,
    pub issue: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub author: String,
    pub created: String,
    pub issue: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub issue: String,
    pub issue_type: String,
    pub assignee: Option<String>,
}

/// Worklogs, comments and issues of a query scope, queried once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerDump {
    pub worklogs: Vec<WorklogRecord>,
    pub comments: Vec<CommentRecord>,
    pub issues: Vec<IssueRecord>,
}

impl TrackerDump {
    /// Runs the JQL query and pulls every worklog and comment of each matched issue.
    pub async fn collect(client: &JiraClient, jql: &str) -> Result<Self> {
        let issues = client.search_all_issues(jql).await?;
        info!("Dumping {} issues matched by query", issues.len());

        let mut dump = TrackerDump::default();
        for issue in issues {
            let worklogs = client.get_issue_worklogs(&issue.key).await?;
            let comments = client.get_issue_comments(&issue.key).await?;
            debug!(
                "{}: {} worklogs, {} comments",
                issue.key,
                worklogs.len(),
                comments.len()
            );
            dump.push_issue(issue, worklogs, comments);
        }
        Ok(dump)
    }

    fn push_issue(&mut self, issue: Issue, worklogs: Vec<Worklog>, comments: Vec<Comment>) {
        self.worklogs.extend(
            worklogs
                .into_iter()
                .map(|worklog| worklog_record(&issue.key, worklog)),
        );
        self.comments.extend(
            comments
                .into_iter()
                .map(|comment| comment_record(&issue.key, comment)),
        );
        self.issues.push(IssueRecord {
            issue_type: issue.issue_type_name(),
            assignee: issue.assignee_login(),
            issue: issue.key,
        });
    }
}

fn author_login(author: Option<&JiraUser>) -> String {
    author.and_then(JiraUser::login).unwrap_or_default()
}

fn worklog_record(issue_key: &str, worklog: Worklog) -> WorklogRecord {
    WorklogRecord {
        author: author_login(worklog.author.as_ref()),
        started: worklog.started,
        time_spent: worklog.time_spent_seconds,
        issue: issue_key.to_string(),
        comment: worklog.comment.unwrap_or_default(),
    }
}

fn comment_record(issue_key: &str, comment: Comment) -> CommentRecord {
    CommentRecord {
        author: author_login(comment.author.as_ref()),
        created: comment.created,
        issue: issue_key.to_string(),
        body: comment.body.unwrap_or_default(),
    }
}
