//! Main/sub measurement units and quantity normalization.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, ProductId};

use crate::transaction::MeasurementType;

/// Measurement units of a product, as provided by the product catalog.
///
/// A product is always tracked in its main unit (e.g. "case"). It may also
/// have a sub unit (e.g. "bottle") with a fixed number of sub units per main
/// unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnits {
    pub product_id: ProductId,
    pub measurement_name: String,
    pub sub_measurement_name: Option<String>,
    pub sub_measurement_value: Option<Decimal>,
}

/// A quantity expressed in main units, alongside how it was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuantity {
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    pub measurement_type: MeasurementType,
    pub measurement_unit: String,
    pub conversion_rate: Decimal,
}

impl ProductUnits {
    pub fn new(
        product_id: ProductId,
        measurement_name: impl Into<String>,
        sub_measurement_name: Option<String>,
        sub_measurement_value: Option<Decimal>,
    ) -> DomainResult<Self> {
        let measurement_name = measurement_name.into();
        if measurement_name.trim().is_empty() {
            return Err(DomainError::validation("measurement_name cannot be empty"));
        }

        let sub_measurement_name = sub_measurement_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        match (&sub_measurement_name, sub_measurement_value) {
            (Some(_), Some(v)) if v <= Decimal::ZERO => {
                return Err(DomainError::validation(
                    "sub_measurement_value must be positive",
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(DomainError::validation(
                    "sub_measurement_name and sub_measurement_value must be given together",
                ));
            }
            _ => {}
        }

        Ok(Self {
            product_id,
            measurement_name,
            sub_measurement_name,
            sub_measurement_value,
        })
    }

    pub fn has_sub_unit(&self) -> bool {
        self.sub_measurement_name.is_some() && self.sub_measurement_value.is_some()
    }

    /// Convert an entered quantity into main units.
    pub fn normalize(
        &self,
        original_quantity: Decimal,
        measurement_type: MeasurementType,
    ) -> DomainResult<NormalizedQuantity> {
        match measurement_type {
            MeasurementType::Main => Ok(NormalizedQuantity {
                quantity: original_quantity,
                original_quantity,
                measurement_type,
                measurement_unit: self.measurement_name.clone(),
                conversion_rate: Decimal::ONE,
            }),
            MeasurementType::Sub => {
                let (Some(name), Some(rate)) =
                    (&self.sub_measurement_name, self.sub_measurement_value)
                else {
                    return Err(DomainError::validation(
                        "product has no sub measurement unit",
                    ));
                };

                let quantity = original_quantity
                    .checked_div(rate)
                    .ok_or_else(|| DomainError::validation("quantity conversion overflowed"))?;

                Ok(NormalizedQuantity {
                    quantity,
                    original_quantity,
                    measurement_type,
                    measurement_unit: name.clone(),
                    conversion_rate: rate,
                })
            }
        }
    }
}
