use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod backup;
use backup::{BackupExecutor, CommandBackupExecutor};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod discovery;
use discovery::{DockerClient, LifecycleEventSource, TargetSource, TriggerControl};

mod metrics;

mod scheduler;
use scheduler::{JobRegistry, Reconciler, SchedulerEngine};

mod trigger;
use trigger::TriggerPoller;

mod watcher;
use watcher::EventWatcher;

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values set there override the CLI.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the Docker Engine API.
    #[clap(long, default_value = "http://127.0.0.1:2375")]
    pub docker_url: String,

    /// Timeout in seconds for Docker API requests.
    #[clap(long, default_value_t = 30)]
    pub docker_timeout_sec: u64,

    /// Label namespace containers use to opt into backups.
    #[clap(long, default_value = "mybackup")]
    pub label_prefix: String,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Directory that receives dump files.
    #[clap(long, default_value = "./backups")]
    pub output_dir: PathBuf,

    /// Dump binary to invoke for each backup.
    #[clap(long, default_value = "mysqldump")]
    pub dump_command: String,

    /// Timeout in seconds for a single dump run.
    #[clap(long, default_value_t = 300)]
    pub dump_timeout_secs: u64,

    /// Seconds between scheduler ticks.
    #[clap(long, default_value_t = 1)]
    pub tick_interval_secs: u64,

    /// Seconds between scans for trigger labels.
    #[clap(long, default_value_t = 10)]
    pub trigger_poll_secs: u64,

    /// Seconds between fallback reconcile sweeps.
    #[clap(long, default_value_t = 300)]
    pub reconcile_interval_secs: u64,

    /// Seconds to wait before reopening a dead event stream.
    #[clap(long, default_value_t = 5)]
    pub resubscribe_delay_secs: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            docker_url: self.docker_url.clone(),
            docker_timeout_sec: self.docker_timeout_sec,
            label_prefix: self.label_prefix.clone(),
            metrics_port: self.metrics_port,
            output_dir: self.output_dir.clone(),
            dump_command: self.dump_command.clone(),
            dump_timeout_secs: self.dump_timeout_secs,
            tick_interval_secs: self.tick_interval_secs,
            trigger_poll_secs: self.trigger_poll_secs,
            reconcile_interval_secs: self.reconcile_interval_secs,
            resubscribe_delay_secs: self.resubscribe_delay_secs,
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
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
        .unwrap();

    info!(
        "backup-warden {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Watching Docker Engine at {}", config.docker_url);
    let docker = Arc::new(DockerClient::new(
        config.docker_url.clone(),
        config.docker_timeout_sec,
        config.label_prefix.clone(),
    ));

    let registry = Arc::new(RwLock::new(JobRegistry::new()));
    let reconciler = Arc::new(Reconciler::new(
        docker.clone() as Arc<dyn TargetSource>,
        registry.clone(),
    ));
    let executor =
        Arc::new(CommandBackupExecutor::new(config.backup.clone())) as Arc<dyn BackupExecutor>;

    // First pass before anything is spawned, so an already-running fleet is
    // scheduled right away. A failure here is retried by the watcher loops.
    match reconciler.reconcile().await {
        Ok(outcome) => info!(
            "Initial scan tracked {} target(s) with {} job(s)",
            outcome.registered, outcome.jobs_added
        ),
        Err(e) => error!("Initial container scan failed: {}", e),
    }

    let shutdown_token = CancellationToken::new();

    let mut engine = SchedulerEngine::new(
        registry.clone(),
        executor.clone(),
        Duration::from_secs(config.scheduler.tick_interval_secs),
        shutdown_token.child_token(),
    );
    let engine_task = tokio::spawn(async move { engine.run().await });

    let poller = TriggerPoller::new(
        docker.clone() as Arc<dyn TargetSource>,
        docker.clone() as Arc<dyn TriggerControl>,
        executor.clone(),
        config.scheduler.trigger_poll_secs,
        shutdown_token.child_token(),
    );
    let poller_task = tokio::spawn(async move { poller.run().await });

    let event_watcher = EventWatcher::new(
        docker.clone() as Arc<dyn LifecycleEventSource>,
        reconciler.clone(),
        Duration::from_secs(config.scheduler.reconcile_interval_secs),
        Duration::from_secs(config.scheduler.resubscribe_delay_secs),
        shutdown_token.child_token(),
    );
    let watcher_task = tokio::spawn(async move { event_watcher.run().await });

    let metrics_port = config.metrics_port;
    let metrics_token = shutdown_token.child_token();
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_port, metrics_token).await {
            error!("Metrics server exited: {:#}", e);
        }
    });

    info!("backup-warden running");
    shutdown_signal().await;
    info!("Shutdown signal received, stopping background tasks");
    shutdown_token.cancel();

    // The engine drains in-flight backups for up to 30s; allow a little
    // extra before abandoning the join.
    let drain = async {
        let _ = engine_task.await;
        let _ = poller_task.await;
        let _ = watcher_task.await;
        let _ = metrics_task.await;
    };
    if tokio::time::timeout(Duration::from_secs(35), drain)
        .await
        .is_err()
    {
        warn!("Some background tasks did not stop in time");
    }

    info!("Shutdown complete");
    Ok(())
}
