use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Metric name prefix for all backup-warden metrics
const PREFIX: &str = "backup_warden";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Backup Run Metrics
    pub static ref BACKUP_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_backup_runs_total"), "Total backup runs by outcome"),
        &["status"]
    ).expect("Failed to create backup_runs_total metric");

    pub static ref BACKUP_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_backup_duration_seconds"),
            "Backup run duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0])
    ).expect("Failed to create backup_duration_seconds metric");

    pub static ref BACKUP_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_backup_running"), "Whether a backup is in flight per target"),
        &["target"]
    ).expect("Failed to create backup_running metric");

    pub static ref TRIGGER_FIRES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_trigger_fires_total"),
        "Total manually triggered backups"
    ).expect("Failed to create trigger_fires_total metric");

    // Discovery Metrics
    pub static ref DISCOVERY_ERRORS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_discovery_errors_total"),
        "Total failed container listing attempts"
    ).expect("Failed to create discovery_errors_total metric");

    // Schedule Metrics
    pub static ref RECONCILE_PASSES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_reconcile_passes_total"),
        "Total completed reconcile passes"
    ).expect("Failed to create reconcile_passes_total metric");

    pub static ref JOBS_REGISTERED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_jobs_registered_total"),
        "Total scheduled jobs created"
    ).expect("Failed to create jobs_registered_total metric");

    pub static ref JOBS_CANCELLED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_jobs_cancelled_total"),
        "Total scheduled jobs cancelled"
    ).expect("Failed to create jobs_cancelled_total metric");

    pub static ref TRACKED_TARGETS: Gauge = Gauge::new(
        format!("{PREFIX}_tracked_targets"),
        "Targets currently tracked by the registry"
    ).expect("Failed to create tracked_targets metric");

    pub static ref SCHEDULED_JOBS: Gauge = Gauge::new(
        format!("{PREFIX}_scheduled_jobs"),
        "Jobs currently held by the registry"
    ).expect("Failed to create scheduled_jobs metric");

    // Process Metrics (memory/CPU will be added later if needed)
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(BACKUP_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKUP_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKUP_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(TRIGGER_FIRES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DISCOVERY_ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RECONCILE_PASSES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_REGISTERED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_CANCELLED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TRACKED_TARGETS.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULED_JOBS.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record a finished backup run
pub fn record_backup_run(status: &str, duration: Duration) {
    BACKUP_RUNS_TOTAL.with_label_values(&[status]).inc();

    BACKUP_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Mark a target's backup as in flight or idle
pub fn set_backup_running(target: &str, running: bool) {
    BACKUP_RUNNING
        .with_label_values(&[target])
        .set(if running { 1.0 } else { 0.0 });
}

/// Record a served trigger request
pub fn record_trigger_fire() {
    TRIGGER_FIRES_TOTAL.inc();
}

/// Record a failed container listing
pub fn record_discovery_error() {
    DISCOVERY_ERRORS_TOTAL.inc();
}

/// Record a completed reconcile pass
pub fn record_reconcile_pass() {
    RECONCILE_PASSES_TOTAL.inc();
}

/// Record jobs created by a reconcile pass
pub fn record_jobs_registered(count: usize) {
    JOBS_REGISTERED_TOTAL.inc_by(count as f64);
}

/// Record jobs cancelled by a reconcile pass
pub fn record_jobs_cancelled(count: usize) {
    JOBS_CANCELLED_TOTAL.inc_by(count as f64);
}

/// Update the registry size gauges
pub fn set_schedule_gauges(targets: usize, jobs: usize) {
    TRACKED_TARGETS.set(targets as f64);
    SCHEDULED_JOBS.set(jobs as f64);
}

/// Update process memory usage
pub fn update_memory_usage() {
    // Get current process memory usage
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // Parse the RSS (Resident Set Size) in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            // Convert kB to bytes
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }

    // Fallback for non-Linux systems or if reading fails
    // We'll just not update the metric
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    // Update memory usage before returning metrics
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Serve the /metrics endpoint until the shutdown token fires.
pub async fn serve(port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("binding metrics listener on port {}", port))?;
    tracing::info!("Metrics endpoint listening on 0.0.0.0:{}/metrics", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("metrics server failed")
}
