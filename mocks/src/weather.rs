//! Scripted weather provider
//!
//! Returns a fixed current sample and forecast and records every lookup, so
//! weather-gated planning can be tested without network access.

use agro_advisor::WeatherProvider;
use agro_core::{Forecast, WeatherSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// One call made against the provider
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherLookup {
    Current { latitude: f64, longitude: f64 },
    Forecast { latitude: f64, longitude: f64, days: u32 },
}

#[derive(Clone)]
pub struct MockWeatherProvider {
    current: WeatherSample,
    forecast: Forecast,
    lookups: Arc<Mutex<Vec<WeatherLookup>>>,
}

impl MockWeatherProvider {
    /// Provider reporting fallback conditions and an empty forecast
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current: WeatherSample::fallback(now),
            forecast: Forecast::default(),
            lookups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_current(mut self, sample: WeatherSample) -> Self {
        self.current = sample;
        self
    }

    pub fn with_forecast(mut self, forecast: Forecast) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn lookups(&self) -> Vec<WeatherLookup> {
        self.lookups.lock().clone()
    }

    /// Days requested by the most recent forecast lookup
    pub fn last_forecast_days(&self) -> Option<u32> {
        self.lookups.lock().iter().rev().find_map(|lookup| match lookup {
            WeatherLookup::Forecast { days, .. } => Some(*days),
            WeatherLookup::Current { .. } => None,
        })
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn current(&self, latitude: f64, longitude: f64) -> WeatherSample {
        self.lookups
            .lock()
            .push(WeatherLookup::Current { latitude, longitude });
        self.current.clone()
    }

    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> Forecast {
        self.lookups.lock().push(WeatherLookup::Forecast {
            latitude,
            longitude,
            days,
        });
        self.forecast.clone()
    }
}
