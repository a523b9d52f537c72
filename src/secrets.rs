use keyring::{Entry, Error as KeyringError};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("no password stored for {username} in {service}")]
    NotFound { service: String, username: String },
    #[error("failed to read password for {username} in {service}: {message}")]
    Backend {
        service: String,
        username: String,
        message: String,
    },
}

/// Password lookup keyed by `(service id, username)`.
pub trait SecretStore {
    fn get_password(&self, service: &str, username: &str) -> Result<String, SecretsError>;
}

/// Reads passwords from the OS keyring.
#[derive(Debug, Clone, Default)]
pub struct KeyringSecrets;

impl SecretStore for KeyringSecrets {
    fn get_password(&self, service: &str, username: &str) -> Result<String, SecretsError> {
        debug!("Reading password for {} from keyring service {}", username, service);
        let entry = Entry::new(service, username)
            .map_err(|err| backend_error(service, username, err))?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(KeyringError::NoEntry) => Err(SecretsError::NotFound {
                service: service.to_string(),
                username: username.to_string(),
            }),
            Err(err) => Err(backend_error(service, username, err)),
        }
    }
}

fn backend_error(service: &str, username: &str, err: KeyringError) -> SecretsError {
    SecretsError::Backend {
        service: service.to_string(),
        username: username.to_string(),
        message: err.to_string(),
    }
}
