//! OpenWeatherMap client and growing-condition analysis.
//!
//! Requests use metric units. The API reports wind in m/s; samples carry
//! km/h so they compare directly with [`WeatherConstraints`](agro_core::WeatherConstraints).
//! Transport or decoding failures never surface to callers: the client logs
//! them and answers with [`WeatherSample::fallback`] values.

use agro_core::error::{AgroError, Result};
use agro_core::{Forecast, WeatherSample};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Forecast entries per day (one every three hours)
pub const SAMPLES_PER_DAY: usize = 8;

/// The free forecast endpoint covers five days
pub const MAX_FORECAST_DAYS: u32 = 5;

const MS_TO_KMH: f64 = 3.6;

/// Source of current and forecast weather
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> WeatherSample;

    /// Up to `days` days of three-hourly samples
    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> Forecast;
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmEntry {
    dt: i64,
    main: OwmMain,
    wind: Option<OwmWind>,
    #[serde(default)]
    rain: Option<OwmRain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    #[serde(default)]
    list: Vec<OwmEntry>,
}

impl OwmEntry {
    fn into_sample(self) -> WeatherSample {
        let rain = self.rain.unwrap_or_default();
        WeatherSample {
            at: DateTime::from_timestamp(self.dt, 0).unwrap_or_else(Utc::now),
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.map_or(0.0, |w| w.speed * MS_TO_KMH),
            precipitation: rain.three_hours.or(rain.one_hour).unwrap_or(0.0),
            description: self
                .weather
                .into_iter()
                .next()
                .map(|c| c.description)
                .unwrap_or_default(),
        }
    }
}

/// HTTP client for OpenWeatherMap
pub struct WeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgroError::Configuration(
                "Weather API key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgroError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: OPENWEATHER_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        latitude: f64,
        longitude: f64,
        extra: &[(&str, String)],
    ) -> Result<T> {
        let mut query = vec![
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        query.extend(extra.iter().cloned());

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(&query)
            .send()
            .await
            .map_err(|e| AgroError::Upstream(format!("Weather request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgroError::Upstream(format!("Weather API error {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| AgroError::Upstream(format!("Failed to parse weather response: {e}")))
    }

    pub async fn try_current(&self, latitude: f64, longitude: f64) -> Result<WeatherSample> {
        let entry: OwmEntry = self.get("weather", latitude, longitude, &[]).await?;
        Ok(entry.into_sample())
    }

    pub async fn try_forecast(&self, latitude: f64, longitude: f64, days: u32) -> Result<Forecast> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        let wanted = days as usize * SAMPLES_PER_DAY;
        let body: OwmForecast = self
            .get("forecast", latitude, longitude, &[("cnt", wanted.to_string())])
            .await?;

        Ok(Forecast::new(
            body.list
                .into_iter()
                .take(wanted)
                .map(OwmEntry::into_sample)
                .collect(),
        ))
    }
}

/// Three-hourly fallback samples covering `days` from `start`
pub fn fallback_forecast(start: DateTime<Utc>, days: u32) -> Forecast {
    let count = days.max(1) as usize * SAMPLES_PER_DAY;
    Forecast::new(
        (0..count)
            .map(|i| WeatherSample::fallback(start + ChronoDuration::hours(3 * i as i64)))
            .collect(),
    )
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn current(&self, latitude: f64, longitude: f64) -> WeatherSample {
        match self.try_current(latitude, longitude).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!("Current weather unavailable, using defaults: {}", e);
                WeatherSample::fallback(Utc::now())
            }
        }
    }

    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> Forecast {
        match self.try_forecast(latitude, longitude, days).await {
            Ok(forecast) if !forecast.is_empty() => forecast,
            Ok(_) => {
                tracing::warn!("Weather forecast was empty, using defaults");
                fallback_forecast(Utc::now(), days)
            }
            Err(e) => {
                tracing::warn!("Weather forecast unavailable, using defaults: {}", e);
                fallback_forecast(Utc::now(), days)
            }
        }
    }
}

/// Flags derived from current weather and the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowingConditions {
    /// Current temperature within 15..=30 °C
    pub temperature_suitable: bool,
    /// Current humidity within 40..=80 %
    pub humidity_suitable: bool,
    /// Current wind above 20 km/h
    pub wind_risk: bool,
    pub rain_expected: bool,
    /// Any forecast sample below 2 °C
    pub frost_risk: bool,
    pub recommendations: Vec<String>,
}

pub fn analyze_growing_conditions(current: &WeatherSample, forecast: &Forecast) -> GrowingConditions {
    let temperature_suitable = (15.0..=30.0).contains(&current.temperature);
    let humidity_suitable = (40.0..=80.0).contains(&current.humidity);
    let wind_risk = current.wind_speed > 20.0;
    let rain_expected = forecast.samples().iter().any(|s| s.precipitation > 0.0);
    let frost_risk = forecast.samples().iter().any(|s| s.temperature < 2.0);

    let mut recommendations = Vec::new();
    if !temperature_suitable {
        recommendations.push("Temperature is not optimal, monitor growth closely".to_string());
    }
    if !humidity_suitable {
        recommendations.push("Humidity is not optimal, adjust irrigation".to_string());
    }
    if wind_risk {
        recommendations.push("Strong wind risk, plan protections".to_string());
    }
    if rain_expected {
        recommendations.push("Rain expected, plan field work accordingly".to_string());
    }
    if frost_risk {
        recommendations.push("Frost risk, prepare protective measures".to_string());
    }

    GrowingConditions {
        temperature_suitable,
        humidity_suitable,
        wind_risk,
        rain_expected,
        frost_risk,
        recommendations,
    }
}
