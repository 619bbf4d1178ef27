pub mod cli;
pub mod context;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod step;
pub mod transport;

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use credentials::{CredentialEntry, CredentialStore};
use error::NotifyError;

pub use context::{EnvironmentLookup, ExecutionContext, ProcessEnvironment};
pub use credentials::{CredentialKind, CredentialResolver, Secret};
pub use notifier::DeploymentNotifier;
pub use step::{NotificationPayload, NotificationRequest};
pub use transport::{HttpTransport, ReqwestTransport};

pub const DEFAULT_BASE_URL: &str = "https://deploymon.io";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifierConfig {
    pub base_url: Option<String>,
    #[serde(default, rename = "credential")]
    pub credentials: Vec<CredentialEntry>,
}

impl NotifierConfig {
    /// Returns the configured service base URL, falling back to the public deploymon.io instance.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Builds the credential store from the `[[credential]]` tables.
    /// Fails if an id appears more than once, since a lookup must hit exactly one entry.
    pub fn credential_store(&self) -> Result<CredentialStore, NotifyError> {
        let mut seen = HashSet::new();
        for entry in &self.credentials {
            if !seen.insert(entry.id.as_str()) {
                return Err(NotifyError::ConfigError(format!(
                    "Duplicate credential id '{}'",
                    entry.id
                )));
            }
        }
        Ok(CredentialStore::new(self.credentials.clone()))
    }
}

/// Parse a configuration document.
pub fn parse_config(config_str: &str) -> Result<NotifierConfig, NotifyError> {
    let config: NotifierConfig = toml::from_str(config_str)?;
    Ok(config)
}

/// Load and parse the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<NotifierConfig, NotifyError> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        NotifyError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&config_str).map_err(|e| {
        NotifyError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}
