//! trafficdash - system dashboard binary.
//!
//! Samples the host on a fixed tick, keeps a persistent 7-day traffic history
//! and serves both to the browser dashboard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trafficdash::{
    default_sources, start_web_server, HistoryStore, JsonFileStore, Monitor, MonitorConfig,
    RollingHistory, SystemSnapshot, WebConfig, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_SAMPLE_INTERVAL_MS,
    DEFAULT_WEB_PORT,
};

const HISTORY_FILE: &str = "traffic-db.json";

#[derive(Parser)]
#[command(name = "trafficdash")]
#[command(about = "System dashboard with a persistent 7-day network traffic history")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Sampling interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS)]
    sample_interval_ms: u64,

    /// History flush interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_FLUSH_INTERVAL_MS)]
    flush_interval_ms: u64,

    /// Directory the traffic history is stored in
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Mount point or drive label of the disk to report
    #[arg(long, env = "SYSTEM_DRIVE", default_value = "/")]
    disk_label: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Take a single snapshot and exit
    Snapshot(SnapshotArgs),

    /// Print the persisted traffic history
    History,
}

#[derive(Args)]
struct ServeArgs {
    /// Directory holding the dashboard's static files
    #[arg(long, default_value = "public")]
    public_dir: PathBuf,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await,
        Some(Commands::History) => history_command(&cli).await,
        None => {
            let serve_args = ServeArgs {
                public_dir: PathBuf::from("public"),
                no_cors: false,
            };
            serve_command(&cli, &serve_args).await
        }
    }
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// `RUST_LOG` when set, otherwise the level picked by the flags.
fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(log_level(cli)))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    Ok(())
}

fn monitor_config(cli: &Cli) -> MonitorConfig {
    MonitorConfig::default()
        .with_sample_interval_ms(cli.sample_interval_ms)
        .with_flush_interval_ms(cli.flush_interval_ms)
        .with_history_path(cli.data_dir.join(HISTORY_FILE))
        .with_disk_label(cli.disk_label.clone())
}

async fn start_monitor(config: MonitorConfig) -> anyhow::Result<Monitor> {
    let store = Arc::new(JsonFileStore::new(&config.history_path));
    let sources = default_sources(config.disk_label.clone());
    Monitor::start(config, sources, store)
        .await
        .context("failed to start monitor")
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting trafficdash...");

    let config = monitor_config(cli);
    info!("  - History file: {:?}", config.history_path);
    info!("  - Sample interval: {}ms", config.sample_interval_ms);
    info!("  - Flush interval: {}ms", config.flush_interval_ms);

    let monitor = start_monitor(config).await?;
    let snapshots = monitor.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let wait_for = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let monitor_task = tokio::spawn(monitor.run(wait_for(shutdown_rx.clone())));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    let web_config = WebConfig::new(&cli.host, cli.port)
        .with_static_dir(&args.public_dir)
        .with_cors(!args.no_cors);
    info!("  - Bind address: {}:{}", web_config.host, web_config.port);
    info!("  - CORS enabled: {}", web_config.enable_cors);

    start_web_server(web_config, snapshots, wait_for(shutdown_rx))
        .await
        .context("web server failed")?;

    monitor_task.await.context("monitor task panicked")?;
    Ok(())
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let mut monitor = start_monitor(monitor_config(cli)).await?;
    let snapshot = monitor.tick(Utc::now(), Instant::now()).await;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?),
        "pretty" => print_pretty_snapshot(&snapshot),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn history_command(cli: &Cli) -> anyhow::Result<()> {
    let store = JsonFileStore::new(cli.data_dir.join(HISTORY_FILE));
    let now_ms = Utc::now().timestamp_millis();
    let mut history = RollingHistory::from_persisted(&store.load(now_ms).await);
    history.reconcile(now_ms);
    let accumulator = history.accumulator();

    let day_start =
        chrono::DateTime::from_timestamp_millis(accumulator.day_start).unwrap_or_default();
    println!("Traffic history ({:?})", store.path());
    println!("  Current day: {}", day_start.format("%Y-%m-%d"));
    println!("  Samples today: {}", accumulator.count);
    for (age, mean) in history.snapshot().iter().rev().enumerate() {
        let label = match age {
            0 => "today".to_string(),
            1 => "yesterday".to_string(),
            n => format!("{} days ago", n),
        };
        println!("  {:>12}: {:.3} Mbit/s", label, mean);
    }

    Ok(())
}

fn print_pretty_snapshot(snapshot: &SystemSnapshot) {
    println!(
        "System Snapshot ({})",
        chrono::DateTime::from_timestamp_millis(snapshot.timestamp)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!(
        "CPU:         {:.1}% ({} cores, {:.1} GHz)",
        snapshot.cpu.percent, snapshot.cpu.cores, snapshot.cpu.speed_ghz
    );
    println!(
        "Memory:      {:.1} / {:.1} GB ({:.1}%)",
        snapshot.memory.used_gb, snapshot.memory.total_gb, snapshot.memory.used_percent
    );
    println!(
        "Disk {}:  {:.2} / {:.2} TB ({:.1}%)",
        snapshot.disk.label, snapshot.disk.used_tb, snapshot.disk.total_tb, snapshot.disk.used_percent
    );
    println!(
        "Network:     down {:.3} Mbit/s, up {:.3} Mbit/s",
        snapshot.network.down_mbps, snapshot.network.up_mbps
    );
    println!("Processes:   {}", snapshot.processes.total);
    for process in &snapshot.processes.top {
        println!("  {:<20} {}", process.name, process.cpu_label);
    }
    match snapshot.temperature.celsius {
        Some(celsius) => println!("Temperature: {:.1}°C", celsius),
        None => println!("Temperature: unavailable"),
    }
    println!("Week (Mbit/s, oldest first): {:?}", snapshot.traffic_history.week);
}
