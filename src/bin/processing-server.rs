//! Processing server.
//!
//! Accepts one framed `ProcessingRequest` per TCP connection, runs the
//! screenshot, performance and thumbnail tasks on a pool of worker
//! processes, and replies with a `ProcessingResult`.
//!
//! The same binary doubles as the worker: `processing-server worker
//! --settings <json>` serves tasks over stdin/stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use scrape_relay::config::{
    load_or_default, override_address, validate_config, AppConfig, ConfigError, ObservabilityConfig,
    TaskConfig,
};
use scrape_relay::lifecycle::{signals, Shutdown};
use scrape_relay::net::Listener;
use scrape_relay::observability::{init_logging, metrics, LogTarget};
use scrape_relay::pool::{ProcessWorkerFactory, TaskPool};
use scrape_relay::processing::ProcessingServer;
use scrape_relay::tasks;

#[derive(Parser, Debug)]
#[command(name = "processing-server")]
#[command(about = "Heavy page processing back-end", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Listen address (IPv4, IPv6 or hostname)
    #[arg(short, long)]
    ip: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Worker processes (default: number of CPUs)
    #[arg(short = 'n', long)]
    processes: Option<usize>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve heavy tasks over stdin/stdout (started by the pool)
    #[command(hide = true)]
    Worker {
        /// Task settings as JSON
        #[arg(long)]
        settings: String,
    },
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if self.ip.is_some() || self.port.is_some() {
            config.processing.bind_address =
                override_address(&config.processing.bind_address, self.ip.as_deref(), self.port);
        }
        if let Some(processes) = self.processes {
            config.processing.workers = processes;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Command::Worker { settings }) => run_worker(settings),
        None => run_server(&cli),
    }
}

fn run_worker(settings: &str) -> Result<(), Box<dyn std::error::Error>> {
    let settings: TaskConfig = serde_json::from_str(settings)?;
    init_logging(&ObservabilityConfig::default(), LogTarget::Stderr);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        // Ctrl-C belongs to the parent, which stops workers by closing stdin.
        tokio::spawn(async {
            while tokio::signal::ctrl_c().await.is_ok() {}
        });

        tracing::debug!(pid = std::process::id(), "Worker ready");
        tasks::serve(tokio::io::stdin(), tokio::io::stdout(), settings).await
    })?;
    Ok(())
}

fn run_server(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);

    init_logging(&config.observability, LogTarget::Stdout);
    validate_config(&config).map_err(ConfigError::Validation)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let workers = config.processing.effective_workers();
    tracing::info!(
        bind_address = %config.processing.bind_address,
        workers,
        task_timeout_secs = config.processing.task_timeout_secs,
        browser = %config.tasks.screenshot.browser,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.processing.bind_address, config.processing.max_connections).await?;

    let factory = Arc::new(ProcessWorkerFactory::current_exe(&config.tasks)?);
    let pool = Arc::new(TaskPool::start(workers, factory)?);

    let shutdown = Shutdown::new();
    signals::install(&shutdown);

    ProcessingServer::new(&config.processing, pool)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
