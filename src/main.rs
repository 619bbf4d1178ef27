use clap::Parser;
use deploymon_notify::cli::Opts;
use deploymon_notify::error::Result;
use deploymon_notify::logging::{FileLogger, setup_logging};
use deploymon_notify::step::FUNCTION_NAME;
use deploymon_notify::{
    DeploymentNotifier, ExecutionContext, ProcessEnvironment, ReqwestTransport, load_config,
};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let opts = Opts::parse();

    let file_logger = opts.log_dir.as_ref().map(FileLogger::new);
    let guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting {} for project {} ({} -> {})",
        FUNCTION_NAME, opts.project, opts.service, opts.stage
    );

    if let Err(e) = execute(&opts).await {
        error!("{} failed: {}", FUNCTION_NAME, e);
        eprintln!("ERROR: {}", e);
        drop(guard);
        std::process::exit(1);
    }

    info!("{} succeeded", FUNCTION_NAME);
}

async fn execute(opts: &Opts) -> Result<()> {
    let config = load_config(&opts.config)?;
    info!("Using config at {:?}", opts.config);
    debug!("Loaded {} credential(s)", config.credentials.len());

    let store = config.credential_store()?;
    let context = ExecutionContext::from_job_name(opts.job.as_deref());

    let notifier = DeploymentNotifier::new(ReqwestTransport::new())
        .with_base_url(config.base_url())
        .with_dry_run(opts.dry_run);

    let mut build_log = std::io::stdout();
    notifier
        .notify(
            &opts.notification_request(),
            &context,
            &ProcessEnvironment,
            &store,
            &mut build_log,
        )
        .await
}
