//! Reconciled timesheet entries exchanged between reconciliation and replay.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Timesheet task a block of hours is booked against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Development,
    Maintenance,
}

impl Task {
    /// Row label used by the timesheet UI.
    pub fn label(&self) -> &'static str {
        match self {
            Task::Development => "Development",
            Task::Maintenance => "Maintenance",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hours booked on one day of the month against one task, with the comment shown in the timesheet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorklogEntry {
    pub day: u32,
    pub task: Task,
    pub hours: f64,
    pub comment: String,
}

impl WorklogEntry {
    pub fn new(day: u32, task: Task, hours: f64, comment: impl Into<String>) -> Self {
        Self {
            day,
            task,
            hours,
            comment: comment.into(),
        }
    }
}
