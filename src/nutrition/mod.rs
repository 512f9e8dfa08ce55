//! Nutrient arithmetic: per-product calories and per-meal totals.

pub mod macros;
pub mod totals;

pub use macros::Macros;
pub use totals::{compute_totals, MealTotals};
