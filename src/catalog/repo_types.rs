use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::nutrition::Macros;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Product with its category resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub macros: Macros,
    pub category_id: Uuid,
    pub category: String,
}

/// Validated product fields, used for both inserts and full rewrites.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub macros: Macros,
    pub category_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub proteins: i16,
    pub fats: i16,
    pub carbs: i16,
    pub category_id: Uuid,
    pub category: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = anyhow::Error;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            macros: Macros::new(r.proteins.into(), r.fats.into(), r.carbs.into())?,
            category_id: r.category_id,
            category: r.category,
        })
    }
}
