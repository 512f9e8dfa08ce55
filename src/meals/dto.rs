use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::dto::ProductView;
use crate::meals::repo_types::MealName;

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub name: MealName,
    #[serde(default)]
    pub entries: Vec<EntryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryPayload {
    pub product_id: Uuid,
    /// Grams eaten; a plain 100 g portion when omitted.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
pub struct AddEntriesRequest {
    pub entries: Vec<EntryPayload>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMealRequest {
    pub name: MealName,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// `YYYY-MM-DD` in UTC; all meals when omitted.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub id: Uuid,
    pub product: ProductView,
    pub weight: f64,
}

/// Meal with its entries and freshly aggregated totals.
#[derive(Debug, Clone, Serialize)]
pub struct MealDetails {
    pub id: Uuid,
    pub name: MealName,
    /// Owner's username.
    pub user: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub entries: Vec<EntryView>,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub total_calories: f64,
    /// Whether the caller may modify or delete this meal.
    pub can_edit: bool,
}

#[derive(Debug, Serialize)]
pub struct MealSummary {
    pub date: Option<String>,
    pub meals: Vec<MealDetails>,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub total_calories: f64,
}
