//! Builder pattern implementations for easy test data construction
//!
//! Provides fluent builders for:
//! - Field registration payloads with sensible defaults
//! - Product listings
//! - Forecast samples for weather-gated planning

use agro_core::{
    Amount, FieldStatus, GroundType, GrowSpeed, MeasurementUnit, NewField, NewProduct, Period,
    WeatherSample,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Builder for constructing NewField instances in tests
pub struct NewFieldBuilder {
    field: NewField,
}

impl Default for NewFieldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewFieldBuilder {
    /// Create new builder with default values
    pub fn new() -> Self {
        Self {
            field: NewField {
                plant_specie: "Maize".to_string(),
                country: "Benin".to_string(),
                region: "Borgou".to_string(),
                start_on: NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
                measure: 2.5,
                prod_quantity_estimated: 3.0,
                period: Period::Spring,
                project_description: "Rain-fed maize on a family plot".to_string(),
                grow_speed: GrowSpeed::Normal,
                ground_ph: Some(6),
                ground_type: GroundType::Loam,
                organic_materials: None,
                longitude: 2.6,
                latitude: 9.3,
                equipments: None,
                status: FieldStatus::Initial,
            },
        }
    }

    pub fn with_plant_specie(mut self, plant_specie: impl Into<String>) -> Self {
        self.field.plant_specie = plant_specie.into();
        self
    }

    pub fn with_location(mut self, country: impl Into<String>, region: impl Into<String>) -> Self {
        self.field.country = country.into();
        self.field.region = region.into();
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.field.latitude = latitude;
        self.field.longitude = longitude;
        self
    }

    pub fn with_measure(mut self, measure: f64) -> Self {
        self.field.measure = measure;
        self
    }

    /// Set the equipment inventory to a list of names
    pub fn with_equipments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.field.equipments = Some(serde_json::json!(names));
        self
    }

    pub fn with_status(mut self, status: FieldStatus) -> Self {
        self.field.status = status;
        self
    }

    /// Build the final NewField
    pub fn build(self) -> NewField {
        self.field
    }
}

/// Builder for constructing NewProduct instances in tests
pub struct NewProductBuilder {
    product: NewProduct,
}

impl Default for NewProductBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewProductBuilder {
    pub fn new() -> Self {
        Self {
            product: NewProduct {
                field_id: None,
                name: "White maize".to_string(),
                product_type: "cereal".to_string(),
                country: "Benin".to_string(),
                region: "Borgou".to_string(),
                quantity: Amount::from_units(100),
                unit: MeasurementUnit::Kilogram,
                price: Amount::from_units(250),
                on_sale: true,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.product.name = name.into();
        self
    }

    pub fn with_field(mut self, field_id: i64) -> Self {
        self.product.field_id = Some(field_id);
        self
    }

    pub fn with_quantity(mut self, quantity: Amount, unit: MeasurementUnit) -> Self {
        self.product.quantity = quantity;
        self.product.unit = unit;
        self
    }

    pub fn with_price(mut self, price: Amount) -> Self {
        self.product.price = price;
        self
    }

    pub fn on_sale(mut self, on_sale: bool) -> Self {
        self.product.on_sale = on_sale;
        self
    }

    pub fn build(self) -> NewProduct {
        self.product
    }
}

/// Builder for forecast samples, starting from mild, dry conditions
pub struct WeatherSampleBuilder {
    sample: WeatherSample,
}

impl WeatherSampleBuilder {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            sample: WeatherSample::fallback(at),
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.sample.temperature = temperature;
        self
    }

    pub fn wind(mut self, wind_speed: f64) -> Self {
        self.sample.wind_speed = wind_speed;
        self
    }

    pub fn rain(mut self, precipitation: f64) -> Self {
        self.sample.precipitation = precipitation;
        self
    }

    pub fn build(self) -> WeatherSample {
        self.sample
    }
}
