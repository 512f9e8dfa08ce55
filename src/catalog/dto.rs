use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::repo_types::Product;

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
}

/// Full product payload. Macros arrive as plain integers so out-of-range
/// values reach validation instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub proteins: i64,
    pub fats: i64,
    pub carbs: i64,
    /// Category name.
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub proteins: Option<i64>,
    pub fats: Option<i64>,
    pub carbs: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub proteins: u8,
    pub fats: u8,
    pub carbs: u8,
    pub calories: u32,
    pub category: String,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            proteins: p.macros.proteins(),
            fats: p.macros.fats(),
            carbs: p.macros.carbs(),
            calories: p.macros.calories(),
            category: p.category.clone(),
        }
    }
}
