use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealName {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealName {
    pub fn as_str(self) -> &'static str {
        match self {
            MealName::Breakfast => "breakfast",
            MealName::Lunch => "lunch",
            MealName::Dinner => "dinner",
        }
    }
}

impl FromStr for MealName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealName::Breakfast),
            "lunch" => Ok(MealName::Lunch),
            "dinner" => Ok(MealName::Dinner),
            other => anyhow::bail!("unknown meal name {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Meal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: MealName,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<MealRow> for Meal {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name.parse()?,
            created_at: r.created_at,
        })
    }
}

/// One product portion inside a meal.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MealEntry {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub product_id: Uuid,
    pub weight_grams: f64,
}

/// Validated entry waiting to be attached to a meal.
#[derive(Debug, Clone, Copy)]
pub struct NewEntry {
    pub product_id: Uuid,
    pub weight_grams: f64,
}
