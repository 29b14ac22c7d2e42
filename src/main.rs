use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use derivative_server::background_jobs::jobs::{ExpirationSweepJob, StatusRefreshJob};
use derivative_server::background_jobs::JobScheduler;
use derivative_server::config;
use derivative_server::download_jobs::{ArtifactStore, JobCoordinator, SqliteJobStore};
use derivative_server::metrics;
use derivative_server::notifications::{HttpMailRelay, LogMailTransport, MailTransport, Notifier};
use derivative_server::task_manager::TaskManagerClient;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the job database (download_jobs.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Root of the generated artifacts. Defaults to <db_dir>/downloads.
    #[clap(long, value_parser = parse_path)]
    pub downloads_dir: Option<PathBuf>,

    /// Root of the source records read by the task manager. Defaults to <db_dir>/sources.
    #[clap(long, value_parser = parse_path)]
    pub sources_dir: Option<PathBuf>,

    /// Base URL of the task manager rendering the derivatives.
    #[clap(long)]
    pub task_manager_url: Option<String>,

    /// Timeout in seconds for task manager requests.
    #[clap(long, default_value_t = 30)]
    pub task_manager_timeout_sec: u64,

    /// The port for the metrics server (Prometheus scraping). 0 disables it.
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            downloads_dir: args.downloads_dir.clone(),
            sources_dir: args.sources_dir.clone(),
            task_manager_url: args.task_manager_url.clone(),
            task_manager_timeout_sec: args.task_manager_timeout_sec,
            metrics_port: args.metrics_port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "Starting derivative server {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  downloads_dir: {:?}", app_config.downloads_dir);
    info!("  sources_dir: {:?}", app_config.sources_dir);
    info!("  task_manager_url: {}", app_config.task_manager_url);

    if !app_config.download_jobs_db_path().exists() {
        info!(
            "Creating new download jobs database at {:?}",
            app_config.download_jobs_db_path()
        );
    }
    let job_store = Arc::new(SqliteJobStore::new(app_config.download_jobs_db_path())?);

    let task_manager = Arc::new(TaskManagerClient::new(
        app_config.task_manager_url.clone(),
        app_config.task_manager_timeout_sec,
    )?);

    let transport: Arc<dyn MailTransport> = match &app_config.mail_relay_url {
        Some(url) => {
            info!("Mail relay configured at {}", url);
            Arc::new(HttpMailRelay::new(
                url.clone(),
                app_config.task_manager_timeout_sec,
            )?)
        }
        None => {
            info!("No mail relay configured, notifications will only be logged");
            Arc::new(LogMailTransport)
        }
    };
    let notifier = Arc::new(Notifier::new(
        transport,
        app_config.notifications.clone(),
    ));

    let coordinator = Arc::new(JobCoordinator::new(
        job_store,
        task_manager,
        ArtifactStore::new(
            app_config.downloads_dir.clone(),
            app_config.sources_dir.clone(),
        ),
        notifier,
        app_config.download_jobs.clone(),
    ));

    // Drop whatever expired while the server was down
    match coordinator.sweep() {
        Ok(removed) => info!("Startup sweep removed {} expired jobs", removed),
        Err(e) => error!("Startup sweep failed: {}", e),
    }

    info!("Initializing metrics...");
    metrics::init_metrics();

    let shutdown_token = CancellationToken::new();

    let metrics_task = if app_config.metrics_port != 0 {
        let port = app_config.metrics_port;
        let token = shutdown_token.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(port, token).await {
                error!("Metrics server stopped: {:#}", e);
            }
        }))
    } else {
        info!("Metrics endpoint disabled");
        None
    };

    // Set up background job scheduler
    let mut scheduler = JobScheduler::new(shutdown_token.clone());
    scheduler.register_job(Arc::new(ExpirationSweepJob::new(
        coordinator.clone(),
        Duration::from_secs(app_config.download_jobs.sweep_interval_secs),
    )));
    scheduler.register_job(Arc::new(StatusRefreshJob::new(
        coordinator.clone(),
        Duration::from_secs(app_config.download_jobs.status_refresh_interval_secs),
    )));
    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count()
    );

    let shutdown_on_signal = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        shutdown_on_signal.cancel();
    });

    // Returns once the shutdown token is cancelled and running jobs are handled
    scheduler.run().await;
    info!("Scheduler stopped");

    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    Ok(())
}
