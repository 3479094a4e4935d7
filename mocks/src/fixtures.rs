//! Standard test fixtures for consistent testing
//!
//! Provides pre-built test data including:
//! - Registration, field, task and product payloads
//! - Stored records in a given state
//! - Calm and stormy forecasts for the planner

use agro_core::{
    Amount, Field, Forecast, NewField, NewProduct, NewTask, NewUser, Role, Task, TaskFrequency,
    TaskStatus, User, WeatherSample,
};
use chrono::{DateTime, Duration, Utc};

use crate::builders::{NewFieldBuilder, NewProductBuilder, WeatherSampleBuilder};

/// Registration payload that passes validation
pub fn create_new_user() -> NewUser {
    NewUser::new("amina", "amina@example.com", "pass#12")
}

/// Registration payload with a specific email
pub fn create_new_user_with_email(email: &str) -> NewUser {
    NewUser {
        role: Role::Farmer,
        ..NewUser::new("farmer", email, "pass#12")
    }
}

pub fn create_new_field() -> NewField {
    NewFieldBuilder::new().build()
}

pub fn create_new_task() -> NewTask {
    NewTask {
        title: "Weeding".to_string(),
        frequency: TaskFrequency::Weekly,
        description: Some("Remove weeds between rows".to_string()),
        generated: false,
    }
}

pub fn create_new_product() -> NewProduct {
    NewProductBuilder::new().build()
}

/// Stored user with the given balance
pub fn create_test_user(id: i64, access_units: Amount) -> User {
    let now = Utc::now();
    User {
        id,
        username: "amina".to_string(),
        email: format!("user{id}@example.com"),
        role: Role::Farmer,
        access_units,
        is_admin: false,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Stored field owned by `owner`
pub fn create_test_field(id: i64, owner: i64) -> Field {
    let field = create_new_field();
    let now = Utc::now();
    Field {
        id,
        plant_specie: field.plant_specie,
        country: field.country,
        region: field.region,
        start_on: field.start_on,
        measure: field.measure,
        prod_quantity_estimated: field.prod_quantity_estimated,
        period: field.period,
        project_description: field.project_description,
        grow_speed: field.grow_speed,
        ground_ph: field.ground_ph,
        ground_type: field.ground_type,
        organic_materials: field.organic_materials,
        longitude: field.longitude,
        latitude: field.latitude,
        equipments: Some(serde_json::json!(["tractor", "sprayer"])),
        advices: None,
        status: field.status,
        prod_quantity: None,
        created_by: owner,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Stored task with a specific status
pub fn create_test_task_with_status(status: TaskStatus) -> Task {
    let now = Utc::now();
    Task {
        id: 1,
        title: "Irrigation".to_string(),
        frequency: TaskFrequency::Daily,
        description: None,
        field_id: 1,
        status,
        generated: false,
        approved: true,
        created_by: 1,
        created_at: now,
        updated_at: now,
        done_at: (status == TaskStatus::Done).then_some(now),
        deleted_at: None,
    }
}

/// Forecast of mild, dry, still weather every three hours
pub fn create_calm_forecast(start: DateTime<Utc>, hours: i64) -> Forecast {
    Forecast::new(
        (0..hours)
            .step_by(3)
            .map(|h| WeatherSampleBuilder::at(start + Duration::hours(h)).wind(5.0).build())
            .collect(),
    )
}

/// Forecast with rain for the first `stormy_hours`, calm afterwards
pub fn create_stormy_forecast(start: DateTime<Utc>, stormy_hours: i64, hours: i64) -> Forecast {
    Forecast::new(
        (0..hours)
            .step_by(3)
            .map(|h| {
                let at = start + Duration::hours(h);
                if h < stormy_hours {
                    WeatherSampleBuilder::at(at).rain(12.0).wind(40.0).build()
                } else {
                    WeatherSample::fallback(at)
                }
            })
            .collect(),
    )
}
