//! Typed Jira REST client crate used to dump a month of worklog activity.

pub mod client;
pub mod config;
pub mod dump;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use client::JiraClient;
pub use config::JiraConfig;
pub use dump::{CommentRecord, IssueRecord, TrackerDump, WorklogRecord};
pub use error::{JiraError, Result};
pub use models::{Comment, Issue, JiraUser, Worklog};
pub use rate_limiter::RateLimiter;
