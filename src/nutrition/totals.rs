use std::iter::Sum;
use std::ops::Add;

use serde::Serialize;

use super::macros::Macros;

/// Summed nutrients of a set of servings. Fractional values are kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MealTotals {
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
}

impl Add for MealTotals {
    type Output = MealTotals;

    fn add(self, rhs: MealTotals) -> MealTotals {
        MealTotals {
            proteins: self.proteins + rhs.proteins,
            fats: self.fats + rhs.fats,
            carbs: self.carbs + rhs.carbs,
            calories: self.calories + rhs.calories,
        }
    }
}

impl Sum for MealTotals {
    fn sum<I: Iterator<Item = MealTotals>>(iter: I) -> Self {
        iter.fold(MealTotals::default(), Add::add)
    }
}

/// Totals over `(macros, weight_grams)` servings: each product's per-100 g
/// values are scaled by the logged weight, then summed.
pub fn compute_totals<I>(entries: I) -> MealTotals
where
    I: IntoIterator<Item = (Macros, f64)>,
{
    entries
        .into_iter()
        .map(|(macros, weight)| macros.scaled(weight))
        .sum()
}
