use agro_server::{
    config::Config,
    setup::{build_state, create_repository, ensure_database_directory_from_config},
    telemetry::{init_telemetry, log_startup_info, report_error},
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "agroflex")]
#[command(about = "Agricultural marketplace and field planning server")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,

    /// Listen address override
    #[arg(long)]
    listen_addr: Option<String>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level override
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => Config::from_file(config_file)?,
        None => Config::from_env()?,
    };

    if let Some(ref database_url) = cli.database_url {
        config.database.url = Some(database_url.clone());
    }
    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

async fn run(config: Config) -> Result<()> {
    ensure_database_directory_from_config(&config)
        .context("Failed to create database directory")?;

    let store = create_repository(&config)
        .await
        .context("Failed to initialize database")?;
    let state = build_state(&config, store).context("Failed to build application state")?;

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    agro_api::serve(listener, state, shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("agroflex shut down cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli).context("Failed to load configuration")?;
    init_telemetry(&config.logging).context("Failed to initialize telemetry")?;

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        std::process::exit(1);
    }
    log_startup_info(&config);

    if let Err(e) = run(config).await {
        report_error(&e, "server");
        std::process::exit(3);
    }
    Ok(())
}
