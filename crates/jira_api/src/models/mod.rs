mod comment;
mod issue;
mod page;
mod user;
mod worklog;

pub use comment::{Comment, CommentPage};
pub use issue::{Issue, IssueFields, IssueType, SearchResults};
pub use page::next_start;
pub use user::JiraUser;
pub use worklog::{Worklog, WorklogPage};
