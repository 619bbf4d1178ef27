//! The `notifyDeployment` step.
//!
//! Resolves the step's credential, builds the payload and endpoint, and sends
//! one authenticated POST to deploymon.io. Every failure aborts the step;
//! nothing is retried.

use std::io::Write;
use tracing::{error, info, warn};

use crate::context::{EnvironmentLookup, ExecutionContext};
use crate::credentials::{CredentialKind, CredentialResolver, Secret};
use crate::error::{NotifyError, Result};
use crate::step::{NotificationRequest, is_blank, versions_endpoint};
use crate::transport::{HttpTransport, OutboundRequest};
use crate::DEFAULT_BASE_URL;

pub const SUCCESS_MESSAGE: &str = "Successfully notified deploymon.io";

/// Response bodies longer than this are cut in error messages
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug)]
pub struct DeploymentNotifier<T> {
    transport: T,
    base_url: String,
    dry_run: bool,
}

impl<T: HttpTransport> DeploymentNotifier<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            dry_run: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// In dry-run mode everything up to the HTTP call happens, then the request is only reported.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the step once. `build_log` receives a single line on success.
    pub async fn notify<W: Write>(
        &self,
        request: &NotificationRequest,
        context: &ExecutionContext,
        env: &impl EnvironmentLookup,
        credentials: &impl CredentialResolver,
        build_log: &mut W,
    ) -> Result<()> {
        let token = resolve_token(request, context, credentials)?;

        let payload = request.payload(env);
        let body = payload.to_json()?;
        let endpoint = versions_endpoint(&self.base_url, &request.project)?;

        if self.dry_run {
            info!("Dry run, not sending notification to {}", endpoint);
            writeln!(build_log, "Dry run: would POST {} {}", endpoint, body)?;
            return Ok(());
        }

        let outbound = OutboundRequest::json_post(endpoint, body, &token).map_err(|e| {
            NotifyError::NotificationSendFailed {
                status: None,
                message: e.to_string(),
            }
        })?;
        drop(token);

        info!(
            "Notifying deploymon.io: project={} service={} stage={} version={}",
            request.project, request.service, request.stage, request.version
        );

        let response = self.transport.send(outbound).await.map_err(|e| {
            error!("Deploymon request failed: {}", e);
            NotifyError::NotificationSendFailed {
                status: None,
                message: e.to_string(),
            }
        })?;

        if !response.status.is_success() {
            let message = format!("HTTP {}: {}", response.status, truncate(&response.body));
            error!("Deploymon rejected notification: {}", message);
            return Err(NotifyError::NotificationSendFailed {
                status: Some(response.status.as_u16()),
                message,
            });
        }

        // The deployment is recorded at this point; a broken build log must not undo that.
        if let Err(e) = writeln!(build_log, "{}", SUCCESS_MESSAGE) {
            warn!("Failed to write to build log: {}", e);
        }
        Ok(())
    }
}

fn resolve_token(
    request: &NotificationRequest,
    context: &ExecutionContext,
    credentials: &impl CredentialResolver,
) -> Result<Secret> {
    if is_blank(&request.credentials) {
        return Err(NotifyError::MissingCredentialConfig);
    }

    credentials
        .resolve(&request.credentials, CredentialKind::SecretText, context)
        .ok_or_else(|| NotifyError::CredentialNotFound(request.credentials.clone()))
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ENV_BUILD_URL;
    use crate::credentials::{CredentialEntry, CredentialStore};
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers every request with a fixed outcome and remembers what it was sent.
    struct RecordingTransport {
        outcome: std::result::Result<StatusCode, String>,
        sent: Mutex<Vec<OutboundRequest>>,
    }

    impl RecordingTransport {
        fn status(status: StatusCode) -> Self {
            Self {
                outcome: Ok(status),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                outcome: Err(message.to_string()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn last(&self) -> OutboundRequest {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(
            &self,
            request: OutboundRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            match &self.outcome {
                Ok(status) => Ok(TransportResponse {
                    status: *status,
                    body: "not here".to_string(),
                }),
                Err(message) => Err(TransportError::new(message.clone())),
            }
        }
    }

    fn store() -> CredentialStore {
        CredentialStore::new(vec![CredentialEntry::new(
            "cred1",
            CredentialKind::SecretText,
            "tok-abc",
        )])
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([(ENV_BUILD_URL.to_string(), "http://ci/42".to_string())])
    }

    fn request() -> NotificationRequest {
        NotificationRequest::new("cred1", "proj1", "svc", "prod", "1.2.3").with_url("")
    }

    async fn run(
        notifier: &DeploymentNotifier<RecordingTransport>,
        request: &NotificationRequest,
        env: &HashMap<String, String>,
    ) -> (Result<()>, String) {
        let mut log = Vec::new();
        let result = notifier
            .notify(request, &ExecutionContext::default(), env, &store(), &mut log)
            .await;
        (result, String::from_utf8(log).unwrap())
    }

    #[tokio::test]
    async fn reports_deployment_with_build_url_fallback() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));

        let (result, log) = run(&notifier, &request(), &env()).await;

        assert!(result.is_ok());
        assert_eq!(log, "Successfully notified deploymon.io\n");
        assert_eq!(log.lines().count(), 1);

        let transport = notifier.transport();
        assert_eq!(transport.calls(), 1);
        let sent = transport.last();
        assert_eq!(sent.method, reqwest::Method::POST);
        assert_eq!(
            sent.url.as_str(),
            "https://deploymon.io/api/projects/proj1/versions"
        );
        assert_eq!(sent.headers[AUTHORIZATION], "Bearer tok-abc");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
        assert_eq!(
            sent.body,
            r#"{"service":"svc","stage":"prod","version":"1.2.3","url":"http://ci/42"}"#
        );
    }

    #[tokio::test]
    async fn any_2xx_is_success() {
        for status in [StatusCode::CREATED, StatusCode::ACCEPTED, StatusCode::NO_CONTENT] {
            let notifier = DeploymentNotifier::new(RecordingTransport::status(status));
            let (result, _) = run(&notifier, &request(), &env()).await;
            assert!(result.is_ok(), "{} should count as success", status);
        }
    }

    #[tokio::test]
    async fn empty_build_url_is_sent_as_is() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));
        let env = HashMap::from([(ENV_BUILD_URL.to_string(), String::new())]);

        let (result, _) = run(&notifier, &request(), &env).await;

        assert!(result.is_ok());
        let body: serde_json::Value =
            serde_json::from_str(&notifier.transport().last().body).unwrap();
        assert_eq!(body["url"], "");
    }

    #[tokio::test]
    async fn blank_credential_id_fails_before_sending() {
        for blank in ["", "  "] {
            let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));
            let mut req = request();
            req.credentials = blank.to_string();

            let (result, log) = run(&notifier, &req, &env()).await;

            assert!(matches!(result, Err(NotifyError::MissingCredentialConfig)));
            assert_eq!(notifier.transport().calls(), 0);
            assert!(log.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_credential_fails_before_sending() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));
        let mut req = request();
        req.credentials = "cred2".to_string();

        let (result, _) = run(&notifier, &req, &env()).await;

        match result {
            Err(NotifyError::CredentialNotFound(id)) => assert_eq!(id, "cred2"),
            other => panic!("expected CredentialNotFound, got {:?}", other),
        }
        assert_eq!(notifier.transport().calls(), 0);
    }

    #[tokio::test]
    async fn not_found_response_fails_without_retry() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::NOT_FOUND));

        let (result, log) = run(&notifier, &request(), &env()).await;

        match result {
            Err(NotifyError::NotificationSendFailed { status, message }) => {
                assert_eq!(status, Some(404));
                assert!(message.contains("404"));
            }
            other => panic!("expected NotificationSendFailed, got {:?}", other),
        }
        assert_eq!(notifier.transport().calls(), 1);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_a_send_failure() {
        let notifier = DeploymentNotifier::new(RecordingTransport::failing("connection refused"));

        let (result, _) = run(&notifier, &request(), &env()).await;

        match result {
            Err(NotifyError::NotificationSendFailed { status, message }) => {
                assert_eq!(status, None);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected NotificationSendFailed, got {:?}", other),
        }
        assert_eq!(notifier.transport().calls(), 1);
    }

    #[tokio::test]
    async fn project_is_encoded_into_the_path_only() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK))
            .with_base_url("http://localhost:9000");
        let mut req = request();
        req.project = "abc 123".to_string();

        let (result, _) = run(&notifier, &req, &env()).await;

        assert!(result.is_ok());
        let sent = notifier.transport().last();
        assert_eq!(
            sent.url.as_str(),
            "http://localhost:9000/api/projects/abc%20123/versions"
        );
        assert!(!sent.body.contains("abc 123"));
    }

    #[tokio::test]
    async fn dry_run_resolves_but_does_not_send() {
        let notifier =
            DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK)).with_dry_run(true);

        let (result, log) = run(&notifier, &request(), &env()).await;

        assert!(result.is_ok());
        assert_eq!(notifier.transport().calls(), 0);
        assert!(log.starts_with(
            "Dry run: would POST https://deploymon.io/api/projects/proj1/versions "
        ));
        assert!(!log.contains("tok-abc"));

        let mut req = request();
        req.credentials = "cred2".to_string();
        let (result, _) = run(&notifier, &req, &env()).await;
        assert!(matches!(result, Err(NotifyError::CredentialNotFound(_))));
    }

    /// Build log whose every write fails.
    struct BrokenLog;

    impl Write for BrokenLog {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivered_notification_survives_build_log_failure() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));

        let result = notifier
            .notify(
                &request(),
                &ExecutionContext::default(),
                &env(),
                &store(),
                &mut BrokenLog,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(notifier.transport().calls(), 1);
    }

    #[tokio::test]
    async fn dot_segment_project_fails_before_sending() {
        let notifier = DeploymentNotifier::new(RecordingTransport::status(StatusCode::OK));
        let mut req = request();
        req.project = "..".to_string();

        let (result, _) = run(&notifier, &req, &env()).await;

        assert!(matches!(result, Err(NotifyError::ConfigError(_))));
        assert_eq!(notifier.transport().calls(), 0);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        let cut = truncate(&body);
        assert!(cut.ends_with("... (truncated)"));
        assert_eq!(cut.len(), MAX_ERROR_BODY + "... (truncated)".len());
        assert_eq!(truncate(" short "), "short");
    }
}
