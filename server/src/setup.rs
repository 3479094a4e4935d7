use agro_advisor::{GeminiClient, PlantDatabaseClient, WeatherClient};
use agro_api::AppState;
use agro_core::{AgroStore, OffsetRepository};
use anyhow::{Context, Result};
use database::SqliteRepository;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;

/// Open the SQLite store and bring its schema up to date
pub async fn create_repository(config: &Config) -> Result<Arc<SqliteRepository>> {
    let database_url = config.database_url();
    info!("Initializing SQLite repository at: {}", database_url);

    let repo = SqliteRepository::with_pool_options(
        &database_url,
        config.database.max_connections,
        Duration::from_secs(config.database.connection_timeout),
    )
    .await
    .context("Failed to create SQLite repository")?;

    info!("Running database migrations");
    repo.migrate()
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(repo))
}

/// Wire the store and whichever outbound clients have credentials
pub fn build_state<S>(config: &Config, store: Arc<S>) -> Result<AppState>
where
    S: AgroStore + 'static,
{
    let timeout = config.request_timeout();
    let integrations = &config.integrations;
    let offsets: Arc<dyn OffsetRepository> = store.clone();
    let mut state = AppState::new(store).with_pricing(config.pricing()?);

    match non_empty(&integrations.gemini_api_key) {
        Some(key) => {
            let client = GeminiClient::new(key, &integrations.gemini_model, timeout)
                .context("Failed to create language model client")?;
            state = state.with_llm(Arc::new(client));
            info!(model = %integrations.gemini_model, "Task generation enabled");
        }
        None => warn!("GEMINI_API_KEY not set, task generation disabled"),
    }

    match non_empty(&integrations.weather_api_key) {
        Some(key) => {
            let client = WeatherClient::new(key, timeout)
                .context("Failed to create weather client")?;
            state = state.with_weather(Arc::new(client));
            info!("Weather service enabled");
        }
        None => warn!("WEATHER_API_KEY not set, plans will not be weather-gated"),
    }

    if integrations.plant_api_keys.is_empty() {
        warn!("PERENUAL_API_KEYS not set, plant database proxy disabled");
    } else {
        let client =
            PlantDatabaseClient::new(integrations.plant_api_keys.clone(), offsets, timeout)
                .context("Failed to create plant database client")?;
        info!(keys = client.key_count(), "Plant database enabled");
        state = state.with_plants(Arc::new(client));
    }

    Ok(state)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

/// Create the parent directory of a file database, owner-only on Unix
pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let db_path = Path::new(db_path);

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            info!("Creating database directory: {}", parent.display());
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                    .context("Failed to set directory permissions")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_parent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("agro.sqlite");
        let url = format!("sqlite://{}", db_path.display());

        ensure_database_directory(&url).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_ignores_memory_and_relative_urls() {
        assert!(ensure_database_directory("sqlite::memory:").is_ok());
        assert!(ensure_database_directory("sqlite://agro.sqlite").is_ok());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(&Some(" key ".to_string())), Some("key"));
        assert_eq!(non_empty(&Some("   ".to_string())), None);
        assert_eq!(non_empty(&None), None);
    }
}
