//! Access-unit (AU) pricing for marketplace listings.

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    error::{AgroError, Result},
    models::MeasurementUnit,
};

/// AU charged per unit of listed quantity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessUnitPricing {
    pub kg_rate: Amount,
    pub tonne_rate: Amount,
}

impl Default for AccessUnitPricing {
    fn default() -> Self {
        Self {
            // 0.01 AU per kilogram, 10 AU per tonne
            kg_rate: Amount::from_scaled(100),
            tonne_rate: Amount::from_units(10),
        }
    }
}

impl AccessUnitPricing {
    pub fn new(kg_rate: Amount, tonne_rate: Amount) -> Result<Self> {
        if !kg_rate.is_positive() || !tonne_rate.is_positive() {
            return Err(AgroError::Configuration(
                "access unit rates must be greater than 0".to_string(),
            ));
        }
        Ok(Self { kg_rate, tonne_rate })
    }

    pub fn rate(&self, unit: MeasurementUnit) -> Amount {
        match unit {
            MeasurementUnit::Kilogram => self.kg_rate,
            MeasurementUnit::Tonne => self.tonne_rate,
        }
    }

    /// Cost of listing `quantity` expressed in `unit`
    pub fn cost(&self, unit: MeasurementUnit, quantity: Amount) -> Result<Amount> {
        self.rate(unit).checked_mul(quantity).ok_or_else(|| {
            AgroError::Validation(format!("listing cost for quantity {quantity} overflows"))
        })
    }
}

/// Fail with [`AgroError::InsufficientAccessUnits`] when `balance` cannot cover `cost`
pub fn ensure_affordable(balance: Amount, cost: Amount) -> Result<()> {
    if balance < cost {
        return Err(AgroError::InsufficientAccessUnits {
            required: cost,
            available: balance,
        });
    }
    Ok(())
}
