use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::{AppError, AppResult},
    policy::{authorize, can_read, Action, Resource},
    state::AppState,
};

use super::dto::{
    AddEntriesRequest, CreateMealRequest, MealDetails, MealSummary, Pagination, SummaryQuery,
    UpdateEntryRequest, UpdateMealRequest,
};
use super::services::{
    load_meal, meal_details, parse_day, single_meal_details, summary, validate_entries,
};
use crate::validation::validate_portion;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route("/meals/summary", get(day_summary))
        .route(
            "/meals/:id",
            get(get_meal).patch(rename_meal).delete(delete_meal),
        )
        .route("/meals/:id/entries", post(add_entries))
        .route(
            "/meals/:id/entries/:entry_id",
            patch(update_entry).delete(remove_entry),
        )
}

#[instrument(skip(state, user))]
pub async fn list_meals(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<MealDetails>>> {
    let principal = user.principal();
    authorize(Some(&principal), Action::List, Resource::Meals)?;
    let (limit, offset) = p.clamped();
    let owner = (!principal.is_staff).then_some(principal.id);

    let meals = state.meals.list_meals(owner, limit, offset).await?;
    debug_assert!(meals
        .iter()
        .all(|m| can_read(Some(&principal), Resource::Meal { owner: m.owner_id })));
    Ok(Json(meal_details(&state, &principal, meals).await?))
}

#[instrument(skip(state, user, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateMealRequest>,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<MealDetails>)> {
    let principal = user.principal();
    authorize(Some(&principal), Action::Create, Resource::Meals)?;
    let entries = validate_entries(state.catalog.as_ref(), body.entries).await?;

    let (meal, inserted) = state
        .meals
        .create_meal(principal.id, body.name, &entries)
        .await?;
    info!(meal_id = %meal.id, user_id = %principal.id, entries = inserted.len(), "meal created");

    let location = format!("/api/v1/meals/{}", meal.id);
    let details = single_meal_details(&state, &principal, meal).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(details),
    ))
}

#[instrument(skip(state, user))]
pub async fn get_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MealDetails>> {
    let principal = user.principal();
    let meal = load_meal(&state, &principal, id, Action::Retrieve).await?;
    Ok(Json(single_meal_details(&state, &principal, meal).await?))
}

#[instrument(skip(state, user, body))]
pub async fn rename_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealRequest>,
) -> AppResult<Json<MealDetails>> {
    let principal = user.principal();
    load_meal(&state, &principal, id, Action::Update).await?;
    let meal = state
        .meals
        .rename_meal(id, body.name)
        .await?
        .ok_or(AppError::NotFound("meal"))?;
    info!(meal_id = %id, name = meal.name.as_str(), "meal renamed");
    Ok(Json(single_meal_details(&state, &principal, meal).await?))
}

#[instrument(skip(state, user))]
pub async fn delete_meal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let principal = user.principal();
    load_meal(&state, &principal, id, Action::Delete).await?;
    if !state.meals.delete_meal(id).await? {
        return Err(AppError::NotFound("meal"));
    }
    info!(meal_id = %id, "meal deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user, body))]
pub async fn add_entries(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddEntriesRequest>,
) -> AppResult<Json<MealDetails>> {
    let principal = user.principal();
    let meal = load_meal(&state, &principal, id, Action::Update).await?;
    let entries = validate_entries(state.catalog.as_ref(), body.entries).await?;
    let added = state.meals.add_entries(id, &entries).await?;
    info!(meal_id = %id, added = added.len(), "meal entries added");
    Ok(Json(single_meal_details(&state, &principal, meal).await?))
}

#[instrument(skip(state, user, body))]
pub async fn update_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateEntryRequest>,
) -> AppResult<Json<MealDetails>> {
    let principal = user.principal();
    let meal = load_meal(&state, &principal, id, Action::Update).await?;
    let weight = validate_portion("weight", body.weight)?;
    state
        .meals
        .update_entry(id, entry_id, weight)
        .await?
        .ok_or(AppError::NotFound("entry"))?;
    info!(meal_id = %id, %entry_id, weight, "meal entry updated");
    Ok(Json(single_meal_details(&state, &principal, meal).await?))
}

#[instrument(skip(state, user))]
pub async fn remove_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MealDetails>> {
    let principal = user.principal();
    let meal = load_meal(&state, &principal, id, Action::Update).await?;
    if !state.meals.remove_entry(id, entry_id).await? {
        return Err(AppError::NotFound("entry"));
    }
    info!(meal_id = %id, %entry_id, "meal entry removed");
    Ok(Json(single_meal_details(&state, &principal, meal).await?))
}

#[instrument(skip(state, user))]
pub async fn day_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<SummaryQuery>,
) -> AppResult<Json<MealSummary>> {
    let principal = user.principal();
    authorize(Some(&principal), Action::List, Resource::Meals)?;
    let day = parse_day(q.date.as_deref())?;
    Ok(Json(summary(&state, &principal, day).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::User;
    use crate::catalog::repo_types::{NewProduct, Product};
    use crate::meals::dto::EntryPayload;
    use crate::meals::repo_types::MealName;
    use crate::nutrition::Macros;
    use crate::testing::{seed_user, staff_and_regular};

    async fn seed_product(state: &AppState, name: &str, p: i64, f: i64, c: i64) -> Product {
        let category = match state.catalog.find_category_by_name("Крупы").await.unwrap() {
            Some(c) => c,
            None => state.catalog.create_category("Крупы").await.unwrap(),
        };
        state
            .catalog
            .create_product(NewProduct {
                name: name.into(),
                macros: Macros::new(p, f, c).unwrap(),
                category_id: category.id,
            })
            .await
            .unwrap()
    }

    async fn breakfast(state: &AppState, owner: &User, entries: Vec<EntryPayload>) -> MealDetails {
        let (status, headers, Json(meal)) = create_meal(
            State(state.clone()),
            CurrentUser(owner.clone()),
            Json(CreateMealRequest {
                name: MealName::Breakfast,
                entries,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[0].1, format!("/api/v1/meals/{}", meal.id));
        meal
    }

    #[tokio::test]
    async fn totals_follow_entry_weights() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let oats = seed_product(&state, "Овсянка", 10, 5, 20).await;

        let meal = breakfast(
            &state,
            &alice,
            vec![EntryPayload { product_id: oats.id, weight: 200.0 }],
        )
        .await;
        assert_eq!(meal.total_calories, 280.0);
        assert_eq!(meal.total_proteins, 20.0);
        assert_eq!(meal.user, "alice");
        assert!(meal.can_edit);

        let empty = breakfast(&state, &alice, vec![]).await;
        assert_eq!(empty.total_calories, 0.0);
        assert!(empty.entries.is_empty());
    }

    #[tokio::test]
    async fn adding_then_removing_an_entry_restores_totals() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let oats = seed_product(&state, "Овсянка", 10, 5, 20).await;
        let milk = seed_product(&state, "Молоко", 3, 3, 5).await;

        let meal = breakfast(
            &state,
            &alice,
            vec![EntryPayload { product_id: oats.id, weight: 100.0 }],
        )
        .await;
        let before = meal.total_calories;

        let Json(with_milk) = add_entries(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Path(meal.id),
            Json(AddEntriesRequest {
                entries: vec![EntryPayload { product_id: milk.id, weight: 250.0 }],
            }),
        )
        .await
        .unwrap();
        assert_eq!(with_milk.entries.len(), 2);
        assert!(with_milk.total_calories > before);

        let milk_entry = with_milk.entries[1].id;
        let Json(doubled) = update_entry(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Path((meal.id, milk_entry)),
            Json(UpdateEntryRequest { weight: 500.0 }),
        )
        .await
        .unwrap();
        let milk_kcal_250 = with_milk.total_calories - before;
        assert!((doubled.total_calories - before - 2.0 * milk_kcal_250).abs() < 1e-9);

        let Json(after) = remove_entry(
            State(state.clone()),
            CurrentUser(alice),
            Path((meal.id, milk_entry)),
        )
        .await
        .unwrap();
        assert_eq!(after.total_calories, before);
    }

    #[tokio::test]
    async fn product_changes_show_up_on_next_read() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let oats = seed_product(&state, "Овсянка", 10, 5, 20).await;
        let meal = breakfast(
            &state,
            &alice,
            vec![EntryPayload { product_id: oats.id, weight: 100.0 }],
        )
        .await;
        assert_eq!(meal.total_calories, 140.0);

        state
            .catalog
            .update_product(
                oats.id,
                NewProduct {
                    name: oats.name.clone(),
                    macros: Macros::new(10, 10, 20).unwrap(),
                    category_id: oats.category_id,
                },
            )
            .await
            .unwrap();
        let Json(reread) = get_meal(State(state.clone()), CurrentUser(alice.clone()), Path(meal.id))
            .await
            .unwrap();
        assert_eq!(reread.total_calories, 210.0);

        state.catalog.delete_product(oats.id).await.unwrap();
        let Json(reread) = get_meal(State(state), CurrentUser(alice), Path(meal.id))
            .await
            .unwrap();
        assert!(reread.entries.is_empty());
        assert_eq!(reread.total_calories, 0.0);
    }

    #[tokio::test]
    async fn only_owner_or_staff_touch_a_meal() {
        let state = AppState::fake();
        let (admin, alice) = staff_and_regular(&state).await;
        let mallory = seed_user(&state, "mallory", false).await;
        let meal = breakfast(&state, &alice, vec![]).await;

        let err = get_meal(State(state.clone()), CurrentUser(mallory.clone()), Path(meal.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = delete_meal(State(state.clone()), CurrentUser(mallory.clone()), Path(meal.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let Json(listed) = list_meals(
            State(state.clone()),
            CurrentUser(mallory),
            Query(Pagination::default()),
        )
        .await
        .unwrap();
        assert!(listed.is_empty());

        let Json(seen) = get_meal(State(state.clone()), CurrentUser(admin.clone()), Path(meal.id))
            .await
            .unwrap();
        assert!(seen.can_edit);

        let Json(renamed) = rename_meal(
            State(state.clone()),
            CurrentUser(admin.clone()),
            Path(meal.id),
            Json(UpdateMealRequest { name: MealName::Dinner }),
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, MealName::Dinner);

        let status = delete_meal(State(state.clone()), CurrentUser(admin), Path(meal.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let err = get_meal(State(state), CurrentUser(alice), Path(meal.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn staff_list_every_users_meals() {
        let state = AppState::fake();
        let (admin, alice) = staff_and_regular(&state).await;
        let bob = seed_user(&state, "bob", false).await;
        breakfast(&state, &alice, vec![]).await;
        breakfast(&state, &bob, vec![]).await;

        let Json(all) = list_meals(
            State(state.clone()),
            CurrentUser(admin.clone()),
            Query(Pagination::default()),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.can_edit));

        let Json(own) = list_meals(State(state), CurrentUser(bob), Query(Pagination::default()))
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user, "bob");
    }

    #[tokio::test]
    async fn regular_user_pages_through_only_own_meals() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let bob = seed_user(&state, "bob", false).await;
        for _ in 0..3 {
            breakfast(&state, &alice, vec![]).await;
            breakfast(&state, &bob, vec![]).await;
        }

        let mut seen = Vec::new();
        for offset in [0, 2] {
            let Json(page) = list_meals(
                State(state.clone()),
                CurrentUser(alice.clone()),
                Query(Pagination { limit: 2, offset }),
            )
            .await
            .unwrap();
            seen.extend(page);
        }
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|m| m.user == "alice" && m.can_edit));
    }

    #[tokio::test]
    async fn unknown_product_fails_meal_creation() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let err = create_meal(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Json(CreateMealRequest {
                name: MealName::Lunch,
                entries: vec![EntryPayload { product_id: Uuid::new_v4(), weight: 100.0 }],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(listed) = list_meals(State(state), CurrentUser(alice), Query(Pagination::default()))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn summary_sums_all_or_one_days_meals() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let bob = seed_user(&state, "bob", false).await;
        let oats = seed_product(&state, "Овсянка", 10, 5, 20).await;
        for weight in [100.0, 200.0] {
            breakfast(
                &state,
                &alice,
                vec![EntryPayload { product_id: oats.id, weight }],
            )
            .await;
        }
        breakfast(
            &state,
            &bob,
            vec![EntryPayload { product_id: oats.id, weight: 100.0 }],
        )
        .await;

        let Json(all) = day_summary(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Query(SummaryQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(all.date, None);
        assert_eq!(all.meals.len(), 2);
        assert_eq!(all.total_calories, 420.0);

        let today = time::OffsetDateTime::now_utc().date().to_string();
        let Json(on_day) = day_summary(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Query(SummaryQuery { date: Some(today.clone()) }),
        )
        .await
        .unwrap();
        assert_eq!(on_day.date.as_deref(), Some(today.as_str()));
        assert_eq!(on_day.total_calories, 420.0);

        let Json(past) = day_summary(
            State(state.clone()),
            CurrentUser(alice.clone()),
            Query(SummaryQuery { date: Some("2000-01-01".into()) }),
        )
        .await
        .unwrap();
        assert!(past.meals.is_empty());
        assert_eq!(past.total_calories, 0.0);

        let err = day_summary(
            State(state),
            CurrentUser(alice),
            Query(SummaryQuery { date: Some("yesterday".into()) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summary_for_last_representable_day_is_rejected() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice", false).await;
        let err = day_summary(
            State(state),
            CurrentUser(alice),
            Query(SummaryQuery { date: Some("9999-12-31".into()) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
