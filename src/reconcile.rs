//! Month reconciliation: turns raw worklog and comment records into day-keyed
//! timesheet entries that add up to a full workday.
//!
//! Development hours come straight from the user's own worklogs. Maintenance
//! hours are whatever capacity is left on days with relevant maintenance
//! comments, and every remaining gap or overage is balanced by a filler entry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use jira_api::{CommentRecord, IssueRecord, WorklogRecord};
use log::debug;
use thiserror::Error;

use crate::config::Config;
use crate::entry::{Task, WorklogEntry};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("malformed date `{value}` on {issue}")]
    MalformedDate { value: String, issue: String },
    #[error("invalid period {month}/{year}")]
    InvalidPeriod { month: u32, year: i32 },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Kind of maintenance work a qualifying comment is booked as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceCategory {
    Investigation,
    CodeReview,
    Consultation,
}

impl MaintenanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceCategory::Investigation => "investigation",
            MaintenanceCategory::CodeReview => "code review",
            MaintenanceCategory::Consultation => "consultation",
        }
    }
}

impl fmt::Display for MaintenanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a classification rule gets to look at.
pub struct CommentContext<'a> {
    pub comment: &'a CommentRecord,
    pub assignee: Option<&'a str>,
    pub username: &'a str,
    pub deployment_user: &'a str,
}

impl CommentContext<'_> {
    fn by_deployment_mentioning_user(&self) -> bool {
        self.comment.author == self.deployment_user && self.comment.body.contains(self.username)
    }
}

pub struct ClassificationRule {
    pub category: MaintenanceCategory,
    pub applies: fn(&CommentContext<'_>) -> bool,
}

/// Evaluated top-down, first match wins. The last rule always matches.
pub const CLASSIFICATION_RULES: [ClassificationRule; 3] = [
    ClassificationRule {
        category: MaintenanceCategory::Investigation,
        applies: |ctx| ctx.assignee == Some(ctx.username),
    },
    ClassificationRule {
        category: MaintenanceCategory::CodeReview,
        applies: |ctx| ctx.by_deployment_mentioning_user(),
    },
    ClassificationRule {
        category: MaintenanceCategory::Consultation,
        applies: |_| true,
    },
];

pub fn classify(ctx: &CommentContext<'_>) -> MaintenanceCategory {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.applies)(ctx))
        .map(|rule| rule.category)
        .unwrap_or(MaintenanceCategory::Consultation)
}

/// Builds the month's timesheet entries for one user.
#[derive(Debug, Clone)]
pub struct Reconciler {
    username: String,
    maintenance_issue_type: String,
    deployment_user: String,
    boilerplate_comment: String,
    filler_comment: String,
    workday_hours: f64,
}

impl Reconciler {
    pub fn new(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            maintenance_issue_type: config.maintenance_issue_type.clone(),
            deployment_user: config.deployment_user.clone(),
            boilerplate_comment: config.boilerplate_comment.clone(),
            filler_comment: config.filler_comment.clone(),
            workday_hours: config.workday_hours,
        }
    }

    pub fn reconcile(
        &self,
        worklogs: &[WorklogRecord],
        comments: &[CommentRecord],
        issues: &[IssueRecord],
        month: u32,
        year: i32,
    ) -> Result<Vec<WorklogEntry>> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(ReconcileError::InvalidPeriod { month, year });
        }
        let period = Period { month, year };

        let mut entries = self.development_entries(worklogs, period)?;
        let dev_hours = daily_totals(&entries);

        let maintenance_issues = self.maintenance_index(issues);
        let maintenance_text = self.maintenance_comments(comments, &maintenance_issues, period)?;
        entries.extend(self.maintenance_entries(maintenance_text, &dev_hours));

        let fill = self.fill_entries(&daily_totals(&entries));
        entries.extend(fill);

        entries.sort_by_key(|entry| entry.day);
        Ok(entries)
    }

    fn development_entries(
        &self,
        worklogs: &[WorklogRecord],
        period: Period,
    ) -> Result<Vec<WorklogEntry>> {
        let mut entries = Vec::new();
        for worklog in worklogs.iter().filter(|w| w.author == self.username) {
            let date = record_date(&worklog.started, &worklog.issue)?;
            if !period.contains(date) {
                continue;
            }
            entries.push(WorklogEntry::new(
                date.day(),
                Task::Development,
                worklog.time_spent as f64 / SECONDS_PER_HOUR,
                format!("{}\n{}", worklog.issue, worklog.comment),
            ));
        }
        debug!("{} development entries", entries.len());
        Ok(entries)
    }

    /// Issue id to assignee, for maintenance-type issues only.
    fn maintenance_index<'a>(&self, issues: &'a [IssueRecord]) -> HashMap<&'a str, Option<&'a str>> {
        issues
            .iter()
            .filter(|issue| issue.issue_type == self.maintenance_issue_type)
            .map(|issue| (issue.issue.as_str(), issue.assignee.as_deref()))
            .collect()
    }

    fn is_relevant(&self, comment: &CommentRecord) -> bool {
        let own = comment.author == self.username && comment.body != self.boilerplate_comment;
        let mentioned = comment.author == self.deployment_user && comment.body.contains(&self.username);
        own || mentioned
    }

    /// Day to accumulated, deduplicated maintenance text.
    fn maintenance_comments(
        &self,
        comments: &[CommentRecord],
        maintenance_issues: &HashMap<&str, Option<&str>>,
        period: Period,
    ) -> Result<BTreeMap<u32, String>> {
        let mut by_day: BTreeMap<u32, String> = BTreeMap::new();
        for comment in comments.iter().filter(|c| self.is_relevant(c)) {
            let Some(assignee) = maintenance_issues.get(comment.issue.as_str()) else {
                continue;
            };
            let date = record_date(&comment.created, &comment.issue)?;
            if !period.contains(date) {
                continue;
            }
            let category = classify(&CommentContext {
                comment,
                assignee: *assignee,
                username: &self.username,
                deployment_user: &self.deployment_user,
            });
            let text = format!("{} {}", comment.issue, category);
            append_unique(by_day.entry(date.day()).or_default(), &text);
        }
        Ok(by_day)
    }

    /// Maintenance fills the capacity development left on each commented day.
    fn maintenance_entries(
        &self,
        by_day: BTreeMap<u32, String>,
        dev_hours: &BTreeMap<u32, f64>,
    ) -> Vec<WorklogEntry> {
        by_day
            .into_iter()
            .filter_map(|(day, comment)| {
                let remaining = self.workday_hours - dev_hours.get(&day).copied().unwrap_or(0.0);
                if remaining > 0.0 {
                    Some(WorklogEntry::new(day, Task::Maintenance, remaining, comment))
                } else {
                    debug!("day {}: no capacity left for maintenance", day);
                    None
                }
            })
            .collect()
    }

    /// Balances every day that is not exactly a workday. Overbooked days get a negative entry.
    fn fill_entries(&self, totals: &BTreeMap<u32, f64>) -> Vec<WorklogEntry> {
        totals
            .iter()
            .filter(|(_, hours)| **hours != self.workday_hours)
            .map(|(day, hours)| {
                WorklogEntry::new(
                    *day,
                    Task::Maintenance,
                    self.workday_hours - hours,
                    self.filler_comment.clone(),
                )
            })
            .collect()
    }
}

/// Sum of hours per day.
pub fn daily_totals(entries: &[WorklogEntry]) -> BTreeMap<u32, f64> {
    let mut totals = BTreeMap::new();
    for entry in entries {
        *totals.entry(entry.day).or_insert(0.0) += entry.hours;
    }
    totals
}

/// Appends `text` on a new line unless the accumulated text already contains it.
fn append_unique(accumulated: &mut String, text: &str) {
    if accumulated.contains(text) {
        return;
    }
    let combined = format!("{}\n{}", accumulated, text);
    *accumulated = combined.trim().to_string();
}

#[derive(Debug, Clone, Copy)]
struct Period {
    month: u32,
    year: i32,
}

impl Period {
    fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.year() == self.year
    }
}

/// Parses the leading `YYYY-MM-DD` of a tracker timestamp.
fn record_date(value: &str, issue: &str) -> Result<NaiveDate> {
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| ReconcileError::MalformedDate {
            value: value.to_string(),
            issue: issue.to_string(),
        })
}
