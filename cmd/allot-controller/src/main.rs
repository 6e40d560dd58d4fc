use clap::Parser;
use pkg_constants::paths::{DEFAULT_CONTROLLER_CONFIG, DEFAULT_CONTROLLER_DATA_DIR};
use pkg_constants::quota::DEFAULT_RESYNC_INTERVAL_SECS;
use pkg_controllers::app::AppController;
use pkg_state::client::StateStore;
use pkg_types::config::{ControllerConfigFile, OfferingDefaults, load_config_file};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "allot-controller",
    about = "Resolves workload offerings and enforces project quota"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONTROLLER_CONFIG)]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Seconds between reconciliation passes
    #[arg(long)]
    resync_interval_secs: Option<u64>,

    /// Memory given to workloads nothing else configures (e.g. 256Mi)
    #[arg(long)]
    workload_memory_default: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_CONTROLLER_DATA_DIR.to_string());
    let resync = cli
        .resync_interval_secs
        .or(file_cfg.resync_interval_secs)
        .unwrap_or(DEFAULT_RESYNC_INTERVAL_SECS);
    let memory_default = cli
        .workload_memory_default
        .or(file_cfg.workload_memory_default);
    let defaults = OfferingDefaults::from_memory(memory_default.as_deref())?;

    info!("Starting allot-controller");
    info!("  Data dir:        {}", data_dir);
    info!("  Resync interval: {}s", resync);
    info!(
        "  Memory default:  {}",
        memory_default.as_deref().unwrap_or("unset")
    );

    let store = StateStore::new(&data_dir).await?;
    let controller = AppController::new(store.clone(), defaults)
        .with_interval(Duration::from_secs(resync.max(1)));
    let handle = controller.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.abort();
    store.close().await?;
    Ok(())
}
