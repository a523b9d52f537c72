//! Reconciles a month of Jira activity into an 8-hour-per-day timesheet and
//! replays that timesheet into the timesheet web application.

pub mod config;
pub mod entry;
pub mod error;
pub mod reconcile;
pub mod replay;
pub mod secrets;
pub mod store;
pub mod timesheet_page;
pub mod ui;
pub mod webdriver;

use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use jira_api::{JiraClient, JiraConfig, TrackerDump};
use log::{info, warn};

use config::{Config, ConfigManager};
use entry::WorklogEntry;
use error::Result;
use reconcile::{daily_totals, Reconciler};
use replay::{ReplaySummary, Replayer};
use secrets::{KeyringSecrets, SecretStore};
use timesheet_page::TimesheetPage;
use ui::UiSurface;
use webdriver::{WebDriverConfig, WebDriverSession};

pub use error::AppError;

#[derive(Debug, Clone, Parser)]
#[command(name = "timesheet-sync")]
#[command(about = "Reconcile Jira worklogs into a daily timesheet and replay it into the timesheet UI")]
pub struct Cli {
    /// Config file, defaults to the platform config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Reconcile a month of tracker activity and write the timesheet file.
    Dump {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Submit the timesheet file through the timesheet web UI.
    Replay {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let config = manager.load()?;
    info!("Loaded config from {}", manager.path().display());
    let secrets = KeyringSecrets;

    match cli.command {
        Command::Dump {
            month,
            year,
            output,
        } => {
            let (month, year) = resolve_period(month, year, Local::now().date_naive());
            let output = output.unwrap_or_else(|| config.data_file.clone());
            dump_month(&config, &secrets, month, year, &output).await?;
        }
        Command::Replay { input } => {
            let input = input.unwrap_or_else(|| config.data_file.clone());
            replay_file(&config, &secrets, &input).await?;
        }
    }
    Ok(())
}

/// Fills in the current month/year for whatever was not given explicitly.
pub fn resolve_period(month: Option<u32>, year: Option<i32>, today: NaiveDate) -> (u32, i32) {
    (
        month.unwrap_or_else(|| today.month()),
        year.unwrap_or_else(|| today.year()),
    )
}

/// Dumps the configured JQL scope, reconciles the month and writes the entries to `output`.
pub async fn dump_month(
    config: &Config,
    secrets: &impl SecretStore,
    month: u32,
    year: i32,
    output: &Path,
) -> Result<Vec<WorklogEntry>> {
    let password = secrets.get_password(&config.jira_instance, &config.username)?;
    let client = JiraClient::new(JiraConfig::new(
        &config.jira_server,
        &config.username,
        password,
    ))?;
    let dump = TrackerDump::collect(&client, &config.issue_jql).await?;
    info!(
        "Collected {} worklogs, {} comments, {} issues",
        dump.worklogs.len(),
        dump.comments.len(),
        dump.issues.len()
    );

    let entries = Reconciler::new(config).reconcile(
        &dump.worklogs,
        &dump.comments,
        &dump.issues,
        month,
        year,
    )?;
    for (day, hours) in daily_totals(&entries) {
        info!("{:04}-{:02}-{:02}: {}h", year, month, day, hours);
    }

    store::save_entries(output, &entries)?;
    Ok(entries)
}

/// Replays the entries stored in `input` through a fresh browser session.
pub async fn replay_file(
    config: &Config,
    secrets: &impl SecretStore,
    input: &Path,
) -> Result<ReplaySummary> {
    let entries = store::load_entries(input)?;
    info!("Replaying {} entries from {}", entries.len(), input.display());
    let password = secrets.get_password(&config.timesheet_instance, &config.username)?;

    let driver_config = WebDriverConfig::new(&config.webdriver_url)
        .with_firefox_binary(config.firefox_binary.clone());
    let session = WebDriverSession::start(&driver_config).await?;
    let mut page = TimesheetPage::new(session, config.wait_timeout(), config.settle_delay());

    let outcome = replay_on_page(config, &password, &entries, &mut page).await;
    if let Err(err) = page.into_inner().close().await {
        warn!("Failed to close WebDriver session: {}", err);
    }
    outcome
}

async fn replay_on_page<U: UiSurface>(
    config: &Config,
    password: &str,
    entries: &[WorklogEntry],
    page: &mut TimesheetPage<U>,
) -> Result<ReplaySummary> {
    page.open(&config.timesheet_url).await?;
    page.login(&config.username, password).await?;
    page.open_first_week().await?;
    let replayer = Replayer::new(&config.project, config.full_day_total());
    Ok(replayer.replay(entries, page).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample_config, unique_path};
    use crate::entry::Task;
    use crate::replay::ReplayError;
    use crate::secrets::SecretsError;
    use crate::timesheet_page::tests::first_week_page;
    use mockito::Matcher;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;

    const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

    struct StaticSecrets;

    impl SecretStore for StaticSecrets {
        fn get_password(&self, service: &str, username: &str) -> std::result::Result<String, SecretsError> {
            match (service, username) {
                ("jira", "alice") => Ok("s3cret".to_string()),
                ("domain", "alice") => Ok("t1mesheet".to_string()),
                _ => Err(SecretsError::NotFound {
                    service: service.to_string(),
                    username: username.to_string(),
                }),
            }
        }
    }

    #[test]
    fn period_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date");
        assert_eq!(resolve_period(None, None, today), (5, 2024));
        assert_eq!(resolve_period(Some(4), None, today), (4, 2024));
        assert_eq!(resolve_period(Some(12), Some(2023), today), (12, 2023));
    }

    #[test]
    fn cli_parses_dump_arguments() {
        let cli = Cli::try_parse_from([
            "timesheet-sync",
            "--config",
            "/etc/timesheet.json",
            "dump",
            "--month",
            "5",
            "--year",
            "2024",
        ])
        .expect("arguments parse");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/timesheet.json")));
        match cli.command {
            Command::Dump { month, year, output } => {
                assert_eq!(month, Some(5));
                assert_eq!(year, Some(2024));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_month_out_of_range() {
        assert!(Cli::try_parse_from(["timesheet-sync", "dump", "--month", "13"]).is_err());
    }

    #[tokio::test]
    async fn dump_month_reconciles_tracker_activity_into_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/api/2/search")
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .with_body(r#"{"startAt":0,"maxResults":100,"total":1,"issues":[{"key":"X-1","fields":{"issuetype":{"name":"Story"},"assignee":{"name":"alice"}}}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/issue/X-1/worklog")
            .match_query(Matcher::Any)
            .with_body(r#"{"startAt":0,"maxResults":100,"total":1,"worklogs":[{"author":{"name":"alice"},"comment":"fix","started":"2024-05-03T09:00:00.000+0000","timeSpentSeconds":14400}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/2/issue/X-1/comment")
            .match_query(Matcher::Any)
            .with_body(r#"{"startAt":0,"maxResults":100,"total":0,"comments":[]}"#)
            .create_async()
            .await;

        let mut config = sample_config();
        config.jira_server = server.url();
        let output = unique_path("dump", "timesheet.json");

        let entries = dump_month(&config, &StaticSecrets, 5, 2024, &output)
            .await
            .expect("dump succeeds");

        let expected = vec![
            WorklogEntry::new(3, Task::Development, 4.0, "X-1\nfix"),
            WorklogEntry::new(
                3,
                Task::Maintenance,
                4.0,
                "miscellaneous consultation + non-development tasks",
            ),
        ];
        assert_eq!(entries, expected);
        assert_eq!(store::load_entries(&output).expect("file written"), expected);

        if let Some(parent) = output.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[tokio::test]
    async fn dump_month_requires_stored_password() {
        let mut config = sample_config();
        config.username = "bob".to_string();
        let output = unique_path("dump-no-secret", "timesheet.json");

        let err = dump_month(&config, &StaticSecrets, 5, 2024, &output)
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::Secrets(SecretsError::NotFound { .. })));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn replay_logs_in_and_opens_first_week_before_submitting() {
        let config = sample_config();
        let entries = [WorklogEntry::new(2, Task::Maintenance, 8.0, "filler")];
        let mut page = TimesheetPage::new(first_week_page(), Duration::from_millis(10), Duration::ZERO);

        let summary = replay_on_page(&config, "t1mesheet", &entries, &mut page)
            .await
            .expect("replay succeeds");

        assert_eq!(summary, ReplaySummary { submitted: 1, skipped: 0 });
        assert_eq!(
            page.into_inner().events(),
            vec![
                "navigate https://ehour.example.com",
                "type user",
                "type pass",
                "type pass",
                "click week",
                "click d1",
                "type hours",
                "type comment",
                "click submit",
            ]
        );
    }

    #[tokio::test]
    async fn replay_file_closes_session_when_day_is_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/session")
            .with_body(r#"{"value":{"sessionId":"abc","capabilities":{}}}"#)
            .create_async()
            .await;
        let opened = server
            .mock("POST", "/session/abc/url")
            .match_body(Matcher::PartialJson(json!({"url": "https://ehour.example.com"})))
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;
        for (css, id) in [
            ("[name=\"username\"]", "user"),
            ("[name=\"password\"]", "pass"),
            (".CalendarWeek", "week"),
            (".weekColumnRow", "hdr"),
            ("a[id^=\"nextWeek\"]", "next"),
        ] {
            server
                .mock("POST", "/session/abc/elements")
                .match_body(Matcher::PartialJson(json!({"value": css})))
                .with_body(json!({"value": [{ ELEMENT_KEY: id }]}).to_string())
                .create_async()
                .await;
        }
        server
            .mock("POST", Matcher::Regex(r"^/session/abc/element/(user|pass)/value$".to_string()))
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/session/abc/element/week/click")
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;
        let advanced = server
            .mock("POST", "/session/abc/element/next/click")
            .with_body(r#"{"value":null}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/session/abc/element/hdr/text")
            .with_body(r#"{"value":"Week 18\nWed\n1 May\nThu\n2 May\nFri\n3 May"}"#)
            .create_async()
            .await;
        let closed = server
            .mock("DELETE", "/session/abc")
            .with_body(r#"{"value":null}"#)
            .expect(1)
            .create_async()
            .await;

        let mut config = sample_config();
        config.webdriver_url = server.url();
        config.settle_delay_ms = 0;
        let input = unique_path("replay-missing-day", "timesheet.json");
        store::save_entries(&input, &[WorklogEntry::new(20, Task::Maintenance, 8.0, "filler")])
            .expect("entries saved");

        let err = replay_file(&config, &StaticSecrets, &input)
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::Replay(ReplayError::DayNotFound(20))));
        opened.assert_async().await;
        advanced.assert_async().await;
        closed.assert_async().await;

        if let Some(parent) = input.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
