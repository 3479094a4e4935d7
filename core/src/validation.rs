use regex::Regex;
use std::sync::OnceLock;

use crate::{
    amount::Amount,
    error::{AgroError, Result},
    models::{NewField, NewProduct, NewTask, NewUser, UpdateField, UpdateProduct, UpdateTask, UpdateUser},
};

pub const USERNAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 200;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 8;
pub const TASK_TITLE_MAX_LEN: usize = 200;

/// Characters of which a password must contain at least one
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()-+=/?><,.|~";

/// Largest product quantity accepted (6 digits, 2 of them decimal)
pub const MAX_PRODUCT_QUANTITY: Amount = Amount::from_scaled(99_999_900);

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

fn require_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AgroError::empty_field(field));
    }
    if value.chars().count() > max {
        return Err(AgroError::too_long(field, max));
    }
    Ok(())
}

/// Validation utilities for marketplace input
pub struct Validator;

impl Validator {
    /// Usernames are 1-50 characters and contain no digits
    pub fn validate_username(username: &str) -> Result<()> {
        require_text("username", username, USERNAME_MAX_LEN)?;

        if username.chars().any(|c| c.is_ascii_digit()) {
            return Err(AgroError::Validation(
                "Username must not contain digits".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_email(email: &str) -> Result<()> {
        require_text("email", email, EMAIL_MAX_LEN)?;

        if !email_regex().is_match(email) {
            return Err(AgroError::Validation(format!(
                "Invalid email address: '{email}'"
            )));
        }

        Ok(())
    }

    /// Passwords are 6-8 characters and contain at least one special character
    pub fn validate_password(password: &str) -> Result<()> {
        let len = password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(AgroError::Validation(format!(
                "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters long"
            )));
        }

        if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
            return Err(AgroError::Validation(format!(
                "Password must contain at least one special character among {PASSWORD_SPECIAL_CHARS}"
            )));
        }

        Ok(())
    }

    pub fn validate_new_user(user: &NewUser) -> Result<()> {
        Self::validate_username(&user.username)?;
        Self::validate_email(&user.email)?;
        Self::validate_password(&user.password)?;
        Ok(())
    }

    pub fn validate_update_user(updates: &UpdateUser) -> Result<()> {
        if let Some(ref username) = updates.username {
            Self::validate_username(username)?;
        }
        if let Some(ref email) = updates.email {
            Self::validate_email(email)?;
        }
        Ok(())
    }

    fn validate_ph(ph: Option<i32>) -> Result<()> {
        match ph {
            Some(ph) if !(0..=14).contains(&ph) => Err(AgroError::Validation(format!(
                "Ground pH must be between 0 and 14, got {ph}"
            ))),
            _ => Ok(()),
        }
    }

    fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
        if let Some(lat) = latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AgroError::Validation(format!(
                    "Latitude must be between -90 and 90, got {lat}"
                )));
            }
        }
        if let Some(lon) = longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AgroError::Validation(format!(
                    "Longitude must be between -180 and 180, got {lon}"
                )));
            }
        }
        Ok(())
    }

    fn validate_measure(measure: f64) -> Result<()> {
        if !measure.is_finite() || measure <= 0.0 {
            return Err(AgroError::Validation(
                "Field measure must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_quantity_estimate(field: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(AgroError::Validation(format!(
                "Field '{field}' must not be negative"
            )));
        }
        Ok(())
    }

    pub fn validate_new_field(field: &NewField) -> Result<()> {
        require_text("plant_specie", &field.plant_specie, 200)?;
        require_text("country", &field.country, 50)?;
        require_text("region", &field.region, 100)?;
        if field.project_description.trim().is_empty() {
            return Err(AgroError::empty_field("project_description"));
        }
        Self::validate_measure(field.measure)?;
        Self::validate_quantity_estimate("prod_quantity_estimated", field.prod_quantity_estimated)?;
        Self::validate_ph(field.ground_ph)?;
        Self::validate_coordinates(Some(field.latitude), Some(field.longitude))?;
        Ok(())
    }

    pub fn validate_update_field(updates: &UpdateField) -> Result<()> {
        if let Some(ref plant_specie) = updates.plant_specie {
            require_text("plant_specie", plant_specie, 200)?;
        }
        if let Some(ref country) = updates.country {
            require_text("country", country, 50)?;
        }
        if let Some(ref region) = updates.region {
            require_text("region", region, 100)?;
        }
        if let Some(ref description) = updates.project_description {
            if description.trim().is_empty() {
                return Err(AgroError::empty_field("project_description"));
            }
        }
        if let Some(measure) = updates.measure {
            Self::validate_measure(measure)?;
        }
        if let Some(estimate) = updates.prod_quantity_estimated {
            Self::validate_quantity_estimate("prod_quantity_estimated", estimate)?;
        }
        if let Some(quantity) = updates.prod_quantity {
            Self::validate_quantity_estimate("prod_quantity", quantity)?;
        }
        Self::validate_ph(updates.ground_ph)?;
        Self::validate_coordinates(updates.latitude, updates.longitude)?;
        Ok(())
    }

    pub fn validate_task_title(title: &str) -> Result<()> {
        require_text("title", title, TASK_TITLE_MAX_LEN)
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_task_title(&task.title)
    }

    pub fn validate_update_task(updates: &UpdateTask) -> Result<()> {
        if let Some(ref title) = updates.title {
            Self::validate_task_title(title)?;
        }
        Ok(())
    }

    /// Quantities are positive, below 10 000 and carry at most two decimals
    pub fn validate_quantity(quantity: Amount) -> Result<()> {
        if !quantity.is_positive() {
            return Err(AgroError::Validation(
                "Product quantity must be greater than 0".to_string(),
            ));
        }
        if quantity > MAX_PRODUCT_QUANTITY {
            return Err(AgroError::Validation(format!(
                "Product quantity must be at most {MAX_PRODUCT_QUANTITY}"
            )));
        }
        if quantity.fractional_digits() > 2 {
            return Err(AgroError::Validation(
                "Product quantity must have at most 2 decimal places".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_price(price: Amount) -> Result<()> {
        if price.is_negative() {
            return Err(AgroError::Validation(
                "Product price must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_new_product(product: &NewProduct) -> Result<()> {
        require_text("name", &product.name, 120)?;
        require_text("type", &product.product_type, 120)?;
        require_text("country", &product.country, 50)?;
        require_text("region", &product.region, 120)?;
        Self::validate_quantity(product.quantity)?;
        Self::validate_price(product.price)?;
        Ok(())
    }

    pub fn validate_update_product(updates: &UpdateProduct) -> Result<()> {
        if let Some(ref name) = updates.name {
            require_text("name", name, 120)?;
        }
        if let Some(ref product_type) = updates.product_type {
            require_text("type", product_type, 120)?;
        }
        if let Some(ref country) = updates.country {
            require_text("country", country, 50)?;
        }
        if let Some(ref region) = updates.region {
            require_text("region", region, 120)?;
        }
        if let Some(price) = updates.price {
            Self::validate_price(price)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroundType, MeasurementUnit, Period};
    use chrono::NaiveDate;

    fn new_field() -> NewField {
        NewField {
            plant_specie: "Cassava".to_string(),
            country: "Togo".to_string(),
            region: "Plateaux".to_string(),
            start_on: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            measure: 1.5,
            prod_quantity_estimated: 4.0,
            period: Period::Spring,
            project_description: "Cassava for flour".to_string(),
            grow_speed: Default::default(),
            ground_ph: Some(6),
            ground_type: GroundType::Sand,
            organic_materials: Some(3),
            longitude: 1.2,
            latitude: 7.5,
            equipments: None,
            status: Default::default(),
        }
    }

    fn new_product(quantity: &str) -> NewProduct {
        NewProduct {
            field_id: None,
            name: "Cassava".to_string(),
            product_type: "tuber".to_string(),
            country: "Togo".to_string(),
            region: "Plateaux".to_string(),
            quantity: quantity.parse().unwrap(),
            unit: MeasurementUnit::Kilogram,
            price: Amount::from_units(100),
            on_sale: true,
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(Validator::validate_username("amina").is_ok());
        assert!(Validator::validate_username("Kofi Mensah").is_ok());
        assert!(Validator::validate_username("").is_err());
        assert!(Validator::validate_username("agent007").is_err());
        assert!(Validator::validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(Validator::validate_email("farmer@example.com").is_ok());
        assert!(Validator::validate_email("farmer@example").is_err());
        assert!(Validator::validate_email("farmer.example.com").is_err());
        assert!(Validator::validate_email("").is_err());
        let long = format!("{}@example.com", "a".repeat(200));
        assert!(Validator::validate_email(&long).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(Validator::validate_password("abc#12").is_ok());
        assert!(Validator::validate_password("pa$$word").is_ok());
        assert!(Validator::validate_password("abc12").is_err()); // too short
        assert!(Validator::validate_password("abcdefgh!").is_err()); // too long
        assert!(Validator::validate_password("abcdef").is_err()); // no special
    }

    #[test]
    fn test_validate_field() {
        assert!(Validator::validate_new_field(&new_field()).is_ok());

        let mut field = new_field();
        field.ground_ph = Some(15);
        assert!(Validator::validate_new_field(&field).is_err());

        let mut field = new_field();
        field.measure = 0.0;
        assert!(Validator::validate_new_field(&field).is_err());

        let mut field = new_field();
        field.latitude = 91.0;
        assert!(Validator::validate_new_field(&field).is_err());

        let updates = UpdateField {
            region: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(Validator::validate_update_field(&updates).is_err());
    }

    #[test]
    fn test_validate_product_quantity() {
        assert!(Validator::validate_new_product(&new_product("12.50")).is_ok());
        assert!(Validator::validate_new_product(&new_product("9999.99")).is_ok());
        assert!(Validator::validate_new_product(&new_product("10000")).is_err());
        assert!(Validator::validate_new_product(&new_product("1.255")).is_err());
        assert!(Validator::validate_new_product(&new_product("0")).is_err());
    }

    #[test]
    fn test_validate_task_title() {
        assert!(Validator::validate_new_task(&NewTask::new("Weeding")).is_ok());
        assert!(Validator::validate_new_task(&NewTask::new("  ")).is_err());
        assert!(Validator::validate_new_task(&NewTask::new("x".repeat(201))).is_err());
    }
}
