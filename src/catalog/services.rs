use crate::catalog::dto::{ProductPatch, ProductPayload};
use crate::catalog::repo::CatalogRepo;
use crate::catalog::repo_types::{Category, NewProduct, Product};
use crate::error::AppResult;
use crate::nutrition::Macros;
use crate::validation::{validate_name, ValidationError};

/// Products reference their category by name; an unknown name is a field error.
pub async fn resolve_category(catalog: &dyn CatalogRepo, name: &str) -> AppResult<Category> {
    let name = name.trim();
    catalog
        .find_category_by_name(name)
        .await?
        .ok_or_else(|| ValidationError::new("category", format!("unknown category {name:?}")).into())
}

pub async fn validate_product(
    catalog: &dyn CatalogRepo,
    payload: ProductPayload,
) -> AppResult<NewProduct> {
    let name = validate_name("name", &payload.name)?;
    let macros = Macros::new(payload.proteins, payload.fats, payload.carbs)?;
    let category = resolve_category(catalog, &payload.category).await?;
    Ok(NewProduct {
        name,
        macros,
        category_id: category.id,
    })
}

/// Merges a partial update into `existing` and revalidates the result.
pub async fn apply_patch(
    catalog: &dyn CatalogRepo,
    existing: &Product,
    patch: ProductPatch,
) -> AppResult<NewProduct> {
    let name = match patch.name {
        Some(name) => validate_name("name", &name)?,
        None => existing.name.clone(),
    };
    let macros = Macros::new(
        patch.proteins.unwrap_or(existing.macros.proteins().into()),
        patch.fats.unwrap_or(existing.macros.fats().into()),
        patch.carbs.unwrap_or(existing.macros.carbs().into()),
    )?;
    let category_id = match patch.category {
        Some(category) => resolve_category(catalog, &category).await?.id,
        None => existing.category_id,
    };
    Ok(NewProduct {
        name,
        macros,
        category_id,
    })
}
