//! Addressing helpers for the timesheet application's week view.

use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::sleep;

use crate::replay::TimesheetView;
use crate::ui::{Selector, UiError, UiSurface, KEY_RETURN};

static WEEKDAY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(\d+) ").expect("invalid weekday regex"));

const DAYS_PER_WEEK: usize = 7;

const CALENDAR_WEEK: &str = "CalendarWeek";
const WEEK_COLUMN_ROW: &str = "weekColumnRow";
const TASK_ROW: &str = "td[class=project]";
const INACTIVE_PROJECT_SELECT: &str = "select[id^=inactiveProject]";
const PROJECT_OPTION: &str = "tr>td>select>option";
const ADD_BUTTON: &str = "a[id^=addButton]";
const NEXT_WEEK: &str = "a[id^=\"nextWeek\"]";
const DAY_CELL: &str = "input[id^=day]";
const HOURS_INPUT: &str = "input[id^=hours]";
const COMMENT_INPUT: &str = "textarea[id^=comment]";
const SUBMIT_BUTTON: &str = "a[id^=submit]";
const DAY_TOTAL: &str = "tr[class=\"totalRow\"] > td[id^=\"day\"]";

/// Week view of the timesheet application on top of any `UiSurface`.
pub struct TimesheetPage<U> {
    ui: U,
    wait_timeout: Duration,
    settle_delay: Duration,
}

impl<U: UiSurface> TimesheetPage<U> {
    pub fn new(ui: U, wait_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            ui,
            wait_timeout,
            settle_delay,
        }
    }

    pub fn into_inner(self) -> U {
        self.ui
    }

    pub async fn open(&self, url: &str) -> Result<(), UiError> {
        self.ui.navigate(url).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), UiError> {
        let field = self
            .ui
            .wait_until_present(&Selector::name("username"), self.wait_timeout)
            .await?;
        self.ui.type_text(&field, username).await?;

        let field = self.ui.locate_one(&Selector::name("password")).await?;
        self.ui.type_text(&field, password).await?;
        self.ui.type_text(&field, KEY_RETURN).await
    }

    pub async fn open_first_week(&self) -> Result<(), UiError> {
        let week = self
            .ui
            .wait_until_present(&Selector::class(CALENDAR_WEEK), self.wait_timeout)
            .await?;
        self.ui.click(&week).await
    }

    /// Clicks the first option whose text equals `label`. Returns whether one was found.
    async fn pick_option(&self, label: &str) -> Result<bool, UiError> {
        for option in self.ui.locate(&Selector::css(PROJECT_OPTION)).await? {
            if self.ui.text(&option).await? == label {
                self.ui.click(&option).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Day numbers in a week header text, one per `\n<day> ` occurrence.
pub fn parse_weekdays(header: &str) -> Vec<u32> {
    WEEKDAY_REGEX
        .captures_iter(header)
        .filter_map(|capture| capture[1].parse().ok())
        .collect()
}

/// Hours as typed into the hours field.
pub fn format_hours(hours: f64) -> String {
    hours.to_string()
}

impl<U: UiSurface> TimesheetView for TimesheetPage<U> {
    async fn visible_days(&mut self) -> Result<Vec<u32>, UiError> {
        let selector = Selector::class(WEEK_COLUMN_ROW);
        self.ui.wait_until_present(&selector, self.wait_timeout).await?;
        // Header re-renders after navigation.
        sleep(self.settle_delay).await;
        let header = self.ui.wait_until_present(&selector, self.wait_timeout).await?;
        let days = parse_weekdays(&self.ui.text(&header).await?);
        debug!("visible days: {:?}", days);
        Ok(days)
    }

    async fn next_week(&mut self) -> Result<(), UiError> {
        let link = self.ui.locate_one(&Selector::css(NEXT_WEEK)).await?;
        self.ui.click(&link).await
    }

    async fn task_rows(&mut self) -> Result<Vec<String>, UiError> {
        let mut rows = Vec::new();
        for cell in self.ui.locate(&Selector::css(TASK_ROW)).await? {
            let text = self.ui.text(&cell).await?;
            let label = text.trim();
            if !label.is_empty() {
                rows.push(label.to_string());
            }
        }
        Ok(rows)
    }

    async fn associate_task(&mut self, project: &str, task: &str) -> Result<(), UiError> {
        let select = self
            .ui
            .locate_one(&Selector::css(INACTIVE_PROJECT_SELECT))
            .await?;
        self.ui.click(&select).await?;

        let found_project = self.pick_option(project).await?;
        let found_task = self.pick_option(task).await?;
        if found_project && found_task {
            let add = self.ui.locate_one(&Selector::css(ADD_BUTTON)).await?;
            self.ui.click(&add).await
        } else {
            warn!(
                "cannot associate {} @ {} (project found: {}, task found: {})",
                project, task, found_project, found_task
            );
            Ok(())
        }
    }

    async fn day_total(&mut self, day_index: usize) -> Result<String, UiError> {
        let cell = self
            .ui
            .locate_nth(&Selector::css(DAY_TOTAL), day_index)
            .await?;
        self.ui.text(&cell).await
    }

    async fn submit(
        &mut self,
        day_index: usize,
        task_index: usize,
        hours: f64,
        comment: &str,
    ) -> Result<(), UiError> {
        let cell = self
            .ui
            .locate_nth(&Selector::css(DAY_CELL), day_index + task_index * DAYS_PER_WEEK)
            .await?;
        self.ui.click(&cell).await?;

        let field = self.ui.locate_one(&Selector::css(HOURS_INPUT)).await?;
        self.ui.type_text(&field, &format_hours(hours)).await?;

        let field = self.ui.locate_one(&Selector::css(COMMENT_INPUT)).await?;
        self.ui.type_text(&field, comment).await?;

        let button = self.ui.locate_one(&Selector::css(SUBMIT_BUTTON)).await?;
        self.ui.click(&button).await
    }
}
