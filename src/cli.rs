use clap::Parser;
use std::path::PathBuf;

use crate::step::{DISPLAY_NAME, NotificationRequest};

pub const DEFAULT_CONFIG_PATH: &str = "deploymon.toml";

#[derive(Debug, Parser)]
#[command(name = "notify-deployment", about = DISPLAY_NAME)]
pub struct Opts {
    /// Id of the secret text credential holding the deploymon API token
    #[arg(long, env = "DEPLOYMON_CREDENTIALS", default_value = "")]
    pub credentials: String,

    /// Deploymon project id
    #[arg(long)]
    pub project: String,

    /// Name of the deployed service
    #[arg(long)]
    pub service: String,

    /// Stage the service was deployed to
    #[arg(long)]
    pub stage: String,

    /// Deployed version
    #[arg(long)]
    pub version: String,

    /// Link reported with the deployment. Defaults to $BUILD_URL
    #[arg(long)]
    pub url: Option<String>,

    /// Job the step runs for; used to check credential scopes
    #[arg(long, env = "JOB_NAME")]
    pub job: Option<String>,

    /// Configuration file with the credential store
    #[arg(long, env = "DEPLOYMON_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Resolve credentials and build the request without sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Also write logs to rolling files in this directory
    #[arg(long, env = "DEPLOYMON_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Opts {
    pub fn notification_request(&self) -> NotificationRequest {
        NotificationRequest {
            credentials: self.credentials.clone(),
            project: self.project.clone(),
            service: self.service.clone(),
            stage: self.stage.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
        }
    }
}
