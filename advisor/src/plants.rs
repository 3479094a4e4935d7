//! Perenual plant database proxy.
//!
//! Several API keys can be configured. The key in use is picked from the
//! persisted request offset (`keys[offset % len]`), so rotation survives
//! restarts and is shared by every server instance using the same store.

use agro_core::error::{AgroError, Result};
use agro_core::OffsetRepository;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const PERENUAL_BASE_URL: &str = "https://perenual.com/api";

/// Upstream resources exposed through the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantEndpoint {
    SpeciesList,
    SpeciesDetails(u64),
    PestDiseaseList,
    CareGuide,
    Faq,
}

impl PlantEndpoint {
    pub fn path(&self) -> String {
        match self {
            PlantEndpoint::SpeciesList => "species-list".to_string(),
            PlantEndpoint::SpeciesDetails(id) => format!("species/details/{id}"),
            PlantEndpoint::PestDiseaseList => "pest-disease-list".to_string(),
            PlantEndpoint::CareGuide => "species-care-guide-list".to_string(),
            PlantEndpoint::Faq => "article-faq-list".to_string(),
        }
    }
}

pub struct PlantDatabaseClient {
    client: Client,
    base_url: String,
    keys: Vec<String>,
    offsets: Arc<dyn OffsetRepository>,
}

impl PlantDatabaseClient {
    pub fn new(
        keys: Vec<String>,
        offsets: Arc<dyn OffsetRepository>,
        timeout: Duration,
    ) -> Result<Self> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(AgroError::Configuration(
                "At least one plant database API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgroError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: PERENUAL_BASE_URL.to_string(),
            keys,
            offsets,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn key_for(&self, offset: i64) -> &str {
        let idx = offset.rem_euclid(self.keys.len() as i64) as usize;
        &self.keys[idx]
    }

    /// Fetch an endpoint, passing `query` through unchanged
    ///
    /// A 429 answer advances the stored offset and retries with the next
    /// key. Each key is tried at most once per call.
    pub async fn fetch(&self, endpoint: PlantEndpoint, query: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let mut offset = self
            .offsets
            .current_offset()
            .await?
            .map_or(0, |o| o.offset);

        for _ in 0..self.keys.len() {
            let response = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .query(&[("key", self.key_for(offset))])
                .query(query)
                .send()
                .await
                .map_err(|e| {
                    AgroError::Upstream(format!("Plant database request failed: {}", e.without_url()))
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(offset, "Plant database key rate limited, rotating");
                offset = self.offsets.advance_offset().await?.offset;
                continue;
            }

            if !status.is_success() {
                tracing::error!(endpoint = %endpoint.path(), "Plant database error {}", status);
                return Err(AgroError::Upstream(format!("Plant database error {status}")));
            }

            return response.json().await.map_err(|e| {
                AgroError::Upstream(format!("Failed to parse plant database response: {e}"))
            });
        }

        Err(AgroError::Upstream(
            "Every plant database API key is rate limited".to_string(),
        ))
    }
}
