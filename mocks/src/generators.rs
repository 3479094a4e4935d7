//! Random test data generators using the fake crate
//!
//! Provides realistic random data including:
//! - Usernames and emails that pass registration rules
//! - Plant species and locations for fields
//! - Property-based testing strategies for amounts and task titles

use agro_core::{Amount, MeasurementUnit, NewField, NewTask, TaskFrequency, TaskStatus};
use fake::faker::address::en::CountryName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Words;
use fake::faker::name::en::FirstName;
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;

use crate::builders::NewFieldBuilder;

/// Generate a username without digits, as registration requires
pub fn generate_username() -> String {
    let name: String = FirstName().fake();
    name.chars().filter(|c| !c.is_ascii_digit()).take(50).collect()
}

pub fn generate_email() -> String {
    SafeEmail().fake()
}

/// Generate a crop from a realistic pool
pub fn generate_plant_specie() -> String {
    let species = [
        "Maize", "Sorghum", "Millet", "Cassava", "Yam", "Groundnut", "Cowpea", "Rice",
        "Tomato", "Onion",
    ];
    species[rand::thread_rng().gen_range(0..species.len())].to_string()
}

pub fn generate_task_title() -> String {
    let words: Vec<String> = Words(2..5).fake();
    words.join(" ")
}

/// Generate a random field with realistic data
pub fn generate_random_field() -> NewField {
    let mut rng = rand::thread_rng();
    let country: String = CountryName().fake();
    NewFieldBuilder::new()
        .with_plant_specie(generate_plant_specie())
        .with_location(country.chars().take(50).collect::<String>(), "Central")
        .with_coordinates(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0))
        .with_measure(rng.gen_range(0.5..50.0))
        .build()
}

/// Proptest strategy for product quantities with at most two decimals
pub fn quantity_strategy() -> impl Strategy<Value = Amount> {
    (1i64..=999_999).prop_map(|hundredths| Amount::from_scaled(hundredths * 100))
}

pub fn unit_strategy() -> impl Strategy<Value = MeasurementUnit> {
    prop_oneof![Just(MeasurementUnit::Kilogram), Just(MeasurementUnit::Tonne)]
}

pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Planned),
        Just(TaskStatus::Executing),
        Just(TaskStatus::Done),
    ]
}

/// Proptest strategy for task payloads that pass validation
pub fn new_task_strategy() -> impl Strategy<Value = NewTask> {
    (
        "[A-Za-z][A-Za-z ]{2,60}",
        prop_oneof![
            Just(TaskFrequency::Daily),
            Just(TaskFrequency::Weekly),
            Just(TaskFrequency::Monthly),
            Just(TaskFrequency::Annual),
        ],
        proptest::option::of("[A-Za-z0-9 .,]{0,120}"),
    )
        .prop_map(|(title, frequency, description)| NewTask {
            title,
            frequency,
            description,
            generated: false,
        })
}
