//! Replays reconciled entries into the week-based timesheet UI.
//!
//! Every entry walks the same states: locate the week showing its day, make
//! sure its task row exists, check whether the day is already fully booked,
//! and only then submit. Locating the week and ensuring the task each get
//! exactly one corrective attempt; a second miss aborts the run.

use log::{debug, info};
use thiserror::Error;

use crate::entry::{Task, WorklogEntry};
use crate::ui::UiError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("can't find desired day {0}")]
    DayNotFound(u32),
    #[error("project {project} @ {task} not found")]
    TaskNotFound { task: Task, project: String },
    #[error(transparent)]
    Ui(#[from] UiError),
}

/// Page-level operations on the currently displayed timesheet week.
#[allow(async_fn_in_trait)]
pub trait TimesheetView {
    /// Days of the month shown by the current week, in column order.
    async fn visible_days(&mut self) -> Result<Vec<u32>, UiError>;

    async fn next_week(&mut self) -> Result<(), UiError>;

    /// Task labels of the rows in the current week, in row order.
    async fn task_rows(&mut self) -> Result<Vec<String>, UiError>;

    async fn associate_task(&mut self, project: &str, task: &str) -> Result<(), UiError>;

    /// Text of the total-hours cell for the given column.
    async fn day_total(&mut self, day_index: usize) -> Result<String, UiError>;

    async fn submit(
        &mut self,
        day_index: usize,
        task_index: usize,
        hours: f64,
        comment: &str,
    ) -> Result<(), UiError>;
}

/// Position of a single entry in the replay state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayState {
    WeekLocate { advanced: bool },
    TaskEnsure { day_index: usize, associated: bool },
    LogCheck { day_index: usize, task_index: usize },
    Submit { day_index: usize, task_index: usize },
    Skipped,
    Submitted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub submitted: usize,
    pub skipped: usize,
}

pub struct Replayer {
    project: String,
    full_day_total: String,
}

impl Replayer {
    pub fn new(project: impl Into<String>, full_day_total: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            full_day_total: full_day_total.into(),
        }
    }

    /// Replays all entries in order, stopping at the first error.
    pub async fn replay<V: TimesheetView>(
        &self,
        entries: &[WorklogEntry],
        view: &mut V,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut summary = ReplaySummary::default();
        for entry in entries {
            match self.replay_entry(entry, view).await? {
                ReplayState::Submitted => summary.submitted += 1,
                _ => summary.skipped += 1,
            }
        }
        info!(
            "Replay finished: {} submitted, {} skipped",
            summary.submitted, summary.skipped
        );
        Ok(summary)
    }

    /// Drives one entry to a terminal state: `Submitted` or `Skipped`.
    pub async fn replay_entry<V: TimesheetView>(
        &self,
        entry: &WorklogEntry,
        view: &mut V,
    ) -> Result<ReplayState, ReplayError> {
        let mut state = ReplayState::WeekLocate { advanced: false };
        loop {
            debug!("day {} {}: {:?}", entry.day, entry.task, state);
            state = match state {
                ReplayState::WeekLocate { advanced } => {
                    let days = view.visible_days().await?;
                    match days.iter().position(|day| *day == entry.day) {
                        Some(day_index) => ReplayState::TaskEnsure {
                            day_index,
                            associated: false,
                        },
                        None if !advanced => {
                            view.next_week().await?;
                            ReplayState::WeekLocate { advanced: true }
                        }
                        None => return Err(ReplayError::DayNotFound(entry.day)),
                    }
                }
                ReplayState::TaskEnsure {
                    day_index,
                    associated,
                } => {
                    let rows = view.task_rows().await?;
                    match rows.iter().position(|row| row == entry.task.label()) {
                        Some(task_index) => ReplayState::LogCheck {
                            day_index,
                            task_index,
                        },
                        None if !associated => {
                            view.associate_task(&self.project, entry.task.label())
                                .await?;
                            ReplayState::TaskEnsure {
                                day_index,
                                associated: true,
                            }
                        }
                        None => {
                            return Err(ReplayError::TaskNotFound {
                                task: entry.task,
                                project: self.project.clone(),
                            })
                        }
                    }
                }
                ReplayState::LogCheck {
                    day_index,
                    task_index,
                } => {
                    if view.day_total(day_index).await? == self.full_day_total {
                        debug!("day {} already logged", entry.day);
                        ReplayState::Skipped
                    } else {
                        ReplayState::Submit {
                            day_index,
                            task_index,
                        }
                    }
                }
                ReplayState::Submit {
                    day_index,
                    task_index,
                } => {
                    view.submit(day_index, task_index, entry.hours, &entry.comment)
                        .await?;
                    info!("Logged {}h {} on day {}", entry.hours, entry.task, entry.day);
                    ReplayState::Submitted
                }
                terminal @ (ReplayState::Skipped | ReplayState::Submitted) => return Ok(terminal),
            };
        }
    }
}
