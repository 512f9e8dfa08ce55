use std::collections::HashMap;

use time::{macros::format_description, Date, OffsetDateTime, Time};
use tracing::warn;
use uuid::Uuid;

use crate::{
    catalog::{dto::ProductView, repo::CatalogRepo, repo_types::Product},
    error::{AppError, AppResult},
    meals::{
        dto::{EntryPayload, EntryView, MealDetails, MealSummary},
        repo_types::{Meal, MealEntry, NewEntry},
    },
    nutrition::{compute_totals, MealTotals},
    policy::{authorize, can_write, Action, Principal, Resource},
    state::AppState,
    validation::{validate_portion, ValidationError},
};

/// Loads every product referenced by `ids`. Any missing id fails the call.
pub async fn resolve_products(
    catalog: &dyn CatalogRepo,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Product>> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let found: HashMap<Uuid, Product> = catalog
        .products_by_ids(&unique)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    if let Some(missing) = unique.iter().find(|id| !found.contains_key(id)) {
        warn!(product_id = %missing, "meal references unknown product");
        return Err(AppError::NotFound("product"));
    }
    Ok(found)
}

/// Sums the scaled macros of `entries`, recomputed from current product data.
pub fn totals_for(
    entries: &[MealEntry],
    products: &HashMap<Uuid, Product>,
) -> AppResult<MealTotals> {
    let portions = entries
        .iter()
        .map(|e| {
            products
                .get(&e.product_id)
                .map(|p| (p.macros, e.weight_grams))
                .ok_or(AppError::NotFound("product"))
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(compute_totals(portions))
}

/// Validates portions and checks that every product exists.
pub async fn validate_entries(
    catalog: &dyn CatalogRepo,
    payload: Vec<EntryPayload>,
) -> AppResult<Vec<NewEntry>> {
    let entries = payload
        .into_iter()
        .map(|e| {
            Ok(NewEntry {
                product_id: e.product_id,
                weight_grams: validate_portion("weight", e.weight)?,
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;
    let ids: Vec<Uuid> = entries.iter().map(|e| e.product_id).collect();
    resolve_products(catalog, &ids).await?;
    Ok(entries)
}

/// Fetches a meal and checks that `principal` may perform `action` on it.
pub async fn load_meal(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    action: Action,
) -> AppResult<Meal> {
    let meal = state
        .meals
        .get_meal(id)
        .await?
        .ok_or(AppError::NotFound("meal"))?;
    authorize(Some(principal), action, Resource::Meal { owner: meal.owner_id })?;
    Ok(meal)
}

/// Builds the response view for each meal, with entries and totals
/// aggregated at read time.
pub async fn meal_details(
    state: &AppState,
    principal: &Principal,
    meals: Vec<Meal>,
) -> AppResult<Vec<MealDetails>> {
    let meal_ids: Vec<Uuid> = meals.iter().map(|m| m.id).collect();
    let entries = state.meals.entries_for_meals(&meal_ids).await?;
    let product_ids: Vec<Uuid> = entries.iter().map(|e| e.product_id).collect();
    let products = resolve_products(state.catalog.as_ref(), &product_ids).await?;

    let mut by_meal: HashMap<Uuid, Vec<MealEntry>> = HashMap::new();
    for entry in entries {
        by_meal.entry(entry.meal_id).or_default().push(entry);
    }

    let mut usernames: HashMap<Uuid, String> = HashMap::new();
    let mut out = Vec::with_capacity(meals.len());
    for meal in meals {
        if !usernames.contains_key(&meal.owner_id) {
            let owner = state
                .users
                .find_by_id(meal.owner_id)
                .await?
                .ok_or(AppError::NotFound("user"))?;
            usernames.insert(meal.owner_id, owner.username);
        }
        let user = usernames[&meal.owner_id].clone();

        let meal_entries = by_meal.remove(&meal.id).unwrap_or_default();
        let totals = totals_for(&meal_entries, &products)?;
        let entries = meal_entries
            .iter()
            .map(|e| EntryView {
                id: e.id,
                product: ProductView::from(&products[&e.product_id]),
                weight: e.weight_grams,
            })
            .collect();

        let resource = Resource::Meal { owner: meal.owner_id };
        out.push(MealDetails {
            id: meal.id,
            name: meal.name,
            user,
            created_at: meal.created_at,
            entries,
            total_proteins: totals.proteins,
            total_fats: totals.fats,
            total_carbs: totals.carbs,
            total_calories: totals.calories,
            can_edit: can_write(Some(principal), Action::Update, resource),
        });
    }
    Ok(out)
}

pub async fn single_meal_details(
    state: &AppState,
    principal: &Principal,
    meal: Meal,
) -> AppResult<MealDetails> {
    meal_details(state, principal, vec![meal])
        .await?
        .pop()
        .ok_or(AppError::NotFound("meal"))
}

pub fn parse_day(raw: Option<&str>) -> AppResult<Option<Date>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Date::parse(s, format_description!("[year]-[month]-[day]"))
                .map_err(|_| AppError::from(ValidationError::new("date", "expected YYYY-MM-DD")))
        })
        .transpose()
}

/// `[midnight, next midnight)` in UTC.
fn day_window(day: Date) -> AppResult<(OffsetDateTime, OffsetDateTime)> {
    let next = day
        .next_day()
        .ok_or_else(|| AppError::from(ValidationError::new("date", "out of range")))?;
    Ok((
        day.with_time(Time::MIDNIGHT).assume_utc(),
        next.with_time(Time::MIDNIGHT).assume_utc(),
    ))
}

/// Grand totals over the meals `principal` logged, either on one UTC day or
/// ever.
pub async fn summary(
    state: &AppState,
    principal: &Principal,
    day: Option<Date>,
) -> AppResult<MealSummary> {
    let window = day.map(day_window).transpose()?;
    let meals = state.meals.owner_meals(principal.id, window).await?;
    let meals = meal_details(state, principal, meals).await?;

    let totals: MealTotals = meals
        .iter()
        .map(|m| MealTotals {
            proteins: m.total_proteins,
            fats: m.total_fats,
            carbs: m.total_carbs,
            calories: m.total_calories,
        })
        .sum();

    Ok(MealSummary {
        date: day.map(|d| d.to_string()),
        meals,
        total_proteins: totals.proteins,
        total_fats: totals.fats,
        total_carbs: totals.carbs,
        total_calories: totals.calories,
    })
}
