//! Credential store for the step's authentication secret.

use serde::Deserialize;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::context::ExecutionContext;

/// A plaintext secret resolved for a single call. Zeroed when dropped.
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    SecretText,
    UsernamePassword,
}

/// One `[[credential]]` table of the configuration file.
#[derive(Deserialize, Clone)]
pub struct CredentialEntry {
    pub id: String,
    pub kind: CredentialKind,
    secret: String,
    /// Jobs allowed to use this credential. Empty means every job.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CredentialEntry {
    pub fn new(id: impl Into<String>, kind: CredentialKind, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            secret: secret.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Returns true if the entry may be used from the given context.
    pub fn is_visible_to(&self, context: &ExecutionContext) -> bool {
        if self.scopes.is_empty() {
            return true;
        }
        context
            .job_name
            .as_ref()
            .map(|job| self.scopes.iter().any(|scope| scope == job))
            .unwrap_or(false)
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("secret", &"***")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl Drop for CredentialEntry {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Resolves named secrets scoped to an execution context.
pub trait CredentialResolver {
    fn resolve(
        &self,
        id: &str,
        kind: CredentialKind,
        context: &ExecutionContext,
    ) -> Option<Secret>;
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: Vec<CredentialEntry>,
}

impl CredentialStore {
    pub fn new(entries: Vec<CredentialEntry>) -> Self {
        Self { entries }
    }
}

impl CredentialResolver for CredentialStore {
    fn resolve(
        &self,
        id: &str,
        kind: CredentialKind,
        context: &ExecutionContext,
    ) -> Option<Secret> {
        let entry = self.entries.iter().find(|entry| entry.id == id)?;

        if entry.kind != kind {
            debug!(
                "Credential '{}' is {:?}, expected {:?}",
                id, entry.kind, kind
            );
            return None;
        }
        if !entry.is_visible_to(context) {
            debug!(
                "Credential '{}' is not visible to job {:?}",
                id, context.job_name
            );
            return None;
        }

        Some(Secret::new(entry.secret.as_str()))
    }
}
