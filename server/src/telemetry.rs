use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{Config, LogFormat, LoggingConfig};

/// Build the filter from `RUST_LOG` when set, otherwise from the configured level
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level configuration")
}

/// Initialize the tracing subscriber; call once per process
pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    let registry = Registry::default().with(env_filter(config)?);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            registry.with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_span_list(true)
                .flatten_event(true);
            registry.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(false);
            registry.with(fmt_layer).try_init()
        }
    }
    .context("Tracing subscriber already initialized")?;

    tracing::info!(
        log_level = %config.level,
        log_format = ?config.format,
        "Telemetry initialized"
    );
    Ok(())
}

pub fn log_startup_info(config: &Config) {
    tracing::info!(
        server_address = %config.server_address(),
        database_url = %config.database_url(),
        max_connections = config.database.max_connections,
        llm = config.integrations.gemini_api_key.is_some(),
        weather = config.integrations.weather_api_key.is_some(),
        plant_keys = config.integrations.plant_api_keys.len(),
        kg_rate = %config.market.kg_rate,
        tonne_rate = %config.market.tonne_rate,
        "agroflex starting up"
    );
}

/// Log an error with its whole cause chain
pub fn report_error(error: &anyhow::Error, context: &str) {
    tracing::error!(error = %error, context = context, "Operation failed");

    for (depth, cause) in error.chain().skip(1).enumerate() {
        tracing::error!(error = %cause, depth = depth + 1, "Error cause");
    }
}
