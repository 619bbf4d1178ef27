//! Explicit execution context and environment access.
//!
//! The notifier never reads process state on its own; the host hands it an
//! [`EnvironmentLookup`] and an [`ExecutionContext`] describing the current build.

use std::collections::HashMap;

pub const ENV_BUILD_URL: &str = "BUILD_URL";

/// Read-only view of the build's environment variables.
pub trait EnvironmentLookup {
    fn get(&self, name: &str) -> Option<String>;
}

/// Looks variables up in the environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentLookup for ProcessEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvironmentLookup for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// The build a step runs on behalf of. Credential scopes are checked against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub job_name: Option<String>,
}

impl ExecutionContext {
    pub fn for_job(job_name: impl Into<String>) -> Self {
        Self {
            job_name: Some(job_name.into()),
        }
    }

    /// Context for an optional job name; blank names count as no job.
    pub fn from_job_name(job_name: Option<&str>) -> Self {
        job_name
            .filter(|name| !name.trim().is_empty())
            .map(Self::for_job)
            .unwrap_or_default()
    }
}
