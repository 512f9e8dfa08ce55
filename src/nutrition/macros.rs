use serde::Serialize;

use super::totals::MealTotals;
use crate::validation::ValidationError;

pub const MACRO_MIN: i64 = 0;
pub const MACRO_MAX: i64 = 99;

/// Calories of 100 g of product. Inputs are assumed to be validated macros.
pub fn calories(proteins: u8, fats: u8, carbs: u8) -> u32 {
    (u32::from(proteins) + u32::from(carbs)) * 4 + u32::from(fats) * 9
}

/// Validated macro content of a product, in grams per 100 g.
///
/// Calories are never stored alongside the macros; they are always derived
/// through [`Macros::calories`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Macros {
    proteins: u8,
    fats: u8,
    carbs: u8,
}

impl Macros {
    pub fn new(proteins: i64, fats: i64, carbs: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            proteins: check("proteins", proteins)?,
            fats: check("fats", fats)?,
            carbs: check("carbs", carbs)?,
        })
    }

    pub fn proteins(&self) -> u8 {
        self.proteins
    }

    pub fn fats(&self) -> u8 {
        self.fats
    }

    pub fn carbs(&self) -> u8 {
        self.carbs
    }

    pub fn calories(&self) -> u32 {
        calories(self.proteins, self.fats, self.carbs)
    }

    /// Contribution of a `weight_grams` serving of this product.
    pub fn scaled(&self, weight_grams: f64) -> MealTotals {
        let factor = weight_grams / 100.0;
        MealTotals {
            proteins: f64::from(self.proteins) * factor,
            fats: f64::from(self.fats) * factor,
            carbs: f64::from(self.carbs) * factor,
            calories: f64::from(self.calories()) * factor,
        }
    }
}

fn check(field: &'static str, value: i64) -> Result<u8, ValidationError> {
    if !(MACRO_MIN..=MACRO_MAX).contains(&value) {
        return Err(ValidationError::new(
            field,
            format!("must be within [{MACRO_MIN}, {MACRO_MAX}]"),
        ));
    }
    Ok(value as u8)
}
