//! Top-level error returned by the dump and replay flows.

use jira_api::JiraError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::reconcile::ReconcileError;
use crate::replay::ReplayError;
use crate::secrets::SecretsError;
use crate::store::StoreError;
use crate::ui::UiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Secrets(#[from] SecretsError),
    #[error("jira: {0}")]
    Jira(#[from] JiraError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("ui: {0}")]
    Ui(#[from] UiError),
}

pub type Result<T> = std::result::Result<T, AppError>;
