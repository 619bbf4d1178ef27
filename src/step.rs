use reqwest::Url;
use serde::Serialize;

use crate::context::{ENV_BUILD_URL, EnvironmentLookup};
use crate::error::{NotifyError, Result};

/// Name the step is invoked by from a pipeline script
pub const FUNCTION_NAME: &str = "notifyDeployment";
pub const DISPLAY_NAME: &str = "Notify deploymon.io about a new deployment";

/// Inputs of one `notifyDeployment` invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRequest {
    pub credentials: String,
    pub project: String,
    pub service: String,
    pub stage: String,
    pub version: String,
    pub url: Option<String>,
}

impl NotificationRequest {
    pub fn new(
        credentials: impl Into<String>,
        project: impl Into<String>,
        service: impl Into<String>,
        stage: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            credentials: credentials.into(),
            project: project.into(),
            service: service.into(),
            stage: stage.into(),
            version: version.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// The deployment link to report: the explicit `url` unless blank, else `BUILD_URL`.
    /// A missing `BUILD_URL` yields an empty string; it is not an error.
    pub fn resolve_url(&self, env: &impl EnvironmentLookup) -> String {
        match self.url.as_deref() {
            Some(url) if !is_blank(url) => url.to_string(),
            _ => env.get(ENV_BUILD_URL).unwrap_or_default(),
        }
    }

    /// Builds the JSON body sent to deploymon.io. The project id is not part of it.
    pub fn payload(&self, env: &impl EnvironmentLookup) -> NotificationPayload {
        NotificationPayload {
            service: self.service.clone(),
            stage: self.stage.clone(),
            version: self.version.clone(),
            url: self.resolve_url(env),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationPayload {
    pub service: String,
    pub stage: String,
    pub version: String,
    pub url: String,
}

impl NotificationPayload {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            NotifyError::ConfigError(format!("Failed to serialize notification payload: {}", e))
        })
    }
}

/// Builds `<base>/api/projects/{projectId}/versions`, with the project id
/// percent-encoded as one path segment.
///
/// `.` and `..` are rejected: URL parsing treats them (encoded or not) as dot
/// segments and would rewrite the rest of the path.
pub fn versions_endpoint(base_url: &str, project: &str) -> Result<Url> {
    if matches!(project, "." | "..") {
        return Err(NotifyError::ConfigError(format!(
            "Project id '{}' cannot be used as a URL path segment",
            project
        )));
    }

    let mut url = Url::parse(base_url).map_err(|e| {
        NotifyError::ConfigError(format!("Invalid deploymon base URL '{}': {}", base_url, e))
    })?;

    url.path_segments_mut()
        .map_err(|_| {
            NotifyError::ConfigError(format!(
                "Deploymon base URL '{}' cannot carry a path",
                base_url
            ))
        })?
        .pop_if_empty()
        .extend(["api", "projects", project, "versions"]);

    Ok(url)
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
