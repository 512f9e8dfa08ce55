use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CategoryPayload, ProductPatch, ProductPayload, ProductQuery, ProductView};
use super::repo_types::{Category, ProductFilter};
use super::services::{apply_patch, validate_product};
use crate::{
    auth::extractors::MaybeUser,
    error::{AppError, AppResult},
    policy::{authorize, Action, Resource},
    state::AppState,
    validation::validate_name,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/product-categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/product-categories/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product)
                .put(replace_product)
                .patch(update_product)
                .delete(delete_product),
        )
}

// --- categories ---

#[instrument(skip(state, user))]
pub async fn list_categories(
    State(state): State<AppState>,
    user: MaybeUser,
) -> AppResult<Json<Vec<Category>>> {
    authorize(user.principal().as_ref(), Action::List, Resource::Category)?;
    Ok(Json(state.catalog.list_categories().await?))
}

#[instrument(skip(state, user))]
pub async fn get_category(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    authorize(user.principal().as_ref(), Action::Retrieve, Resource::Category)?;
    let category = state
        .catalog
        .get_category(id)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    Ok(Json(category))
}

#[instrument(skip(state, user, body))]
pub async fn create_category(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<CategoryPayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    authorize(user.principal().as_ref(), Action::Create, Resource::Category)?;
    let name = validate_name("name", &body.name)?;
    let category = state.catalog.create_category(&name).await?;
    info!(category_id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, user, body))]
pub async fn update_category(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CategoryPayload>,
) -> AppResult<Json<Category>> {
    authorize(user.principal().as_ref(), Action::Update, Resource::Category)?;
    let name = validate_name("name", &body.name)?;
    let category = state
        .catalog
        .rename_category(id, &name)
        .await?
        .ok_or(AppError::NotFound("category"))?;
    info!(category_id = %id, name = %category.name, "category renamed");
    Ok(Json(category))
}

#[instrument(skip(state, user))]
pub async fn delete_category(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(user.principal().as_ref(), Action::Delete, Resource::Category)?;
    if !state.catalog.delete_category(id).await? {
        return Err(AppError::NotFound("category"));
    }
    info!(category_id = %id, "category deleted with its products");
    Ok(StatusCode::NO_CONTENT)
}

// --- products ---

#[instrument(skip(state, user))]
pub async fn list_products(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(q): Query<ProductQuery>,
) -> AppResult<Json<Vec<ProductView>>> {
    authorize(user.principal().as_ref(), Action::List, Resource::Product)?;
    let filter = ProductFilter {
        search: q.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        category: q.category.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    let products = state.catalog.list_products(&filter).await?;
    Ok(Json(products.iter().map(ProductView::from).collect()))
}

#[instrument(skip(state, user))]
pub async fn get_product(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductView>> {
    authorize(user.principal().as_ref(), Action::Retrieve, Resource::Product)?;
    let product = state
        .catalog
        .get_product(id)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    Ok(Json(ProductView::from(&product)))
}

#[instrument(skip(state, user, body))]
pub async fn create_product(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<ProductPayload>,
) -> AppResult<(StatusCode, Json<ProductView>)> {
    authorize(user.principal().as_ref(), Action::Create, Resource::Product)?;
    let new = validate_product(state.catalog.as_ref(), body).await?;
    let product = state.catalog.create_product(new).await?;
    info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(ProductView::from(&product))))
}

#[instrument(skip(state, user, body))]
pub async fn replace_product(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductPayload>,
) -> AppResult<Json<ProductView>> {
    authorize(user.principal().as_ref(), Action::Update, Resource::Product)?;
    let new = validate_product(state.catalog.as_ref(), body).await?;
    let product = state
        .catalog
        .update_product(id, new)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    info!(product_id = %id, "product replaced");
    Ok(Json(ProductView::from(&product)))
}

#[instrument(skip(state, user, body))]
pub async fn update_product(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductPatch>,
) -> AppResult<Json<ProductView>> {
    authorize(user.principal().as_ref(), Action::Update, Resource::Product)?;
    let existing = state
        .catalog
        .get_product(id)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    let merged = apply_patch(state.catalog.as_ref(), &existing, body).await?;
    let product = state
        .catalog
        .update_product(id, merged)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    info!(product_id = %id, "product updated");
    Ok(Json(ProductView::from(&product)))
}

#[instrument(skip(state, user))]
pub async fn delete_product(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(user.principal().as_ref(), Action::Delete, Resource::Product)?;
    if !state.catalog.delete_product(id).await? {
        return Err(AppError::NotFound("product"));
    }
    info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::User;
    use crate::testing::staff_and_regular;

    fn as_user(user: &User) -> MaybeUser {
        MaybeUser(Some(user.clone()))
    }

    fn oats() -> ProductPayload {
        ProductPayload {
            name: "Овсянка".into(),
            proteins: 10,
            fats: 5,
            carbs: 20,
            category: "Крупы".into(),
        }
    }

    #[tokio::test]
    async fn anyone_reads_categories_only_staff_writes_them() {
        let state = AppState::fake();
        let (admin, regular) = staff_and_regular(&state).await;

        let (status, Json(created)) = create_category(
            State(state.clone()),
            as_user(&admin),
            Json(CategoryPayload { name: "Крупы".into() }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = create_category(
            State(state.clone()),
            as_user(&regular),
            Json(CategoryPayload { name: "Овощи".into() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));

        let err = create_category(
            State(state.clone()),
            MaybeUser(None),
            Json(CategoryPayload { name: "Овощи".into() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let Json(all) = list_categories(State(state.clone()), MaybeUser(None))
            .await
            .unwrap();
        assert_eq!(all, vec![created.clone()]);

        let Json(one) = get_category(State(state), MaybeUser(None), Path(created.id))
            .await
            .unwrap();
        assert_eq!(one.name, "Крупы");
    }

    #[tokio::test]
    async fn duplicate_category_name_conflicts() {
        let state = AppState::fake();
        let (admin, _) = staff_and_regular(&state).await;
        for expect_ok in [true, false] {
            let res = create_category(
                State(state.clone()),
                as_user(&admin),
                Json(CategoryPayload { name: "Крупы".into() }),
            )
            .await;
            assert_eq!(res.is_ok(), expect_ok);
            if let Err(e) = res {
                assert_eq!(e.status(), StatusCode::CONFLICT);
            }
        }
    }

    #[tokio::test]
    async fn products_require_authentication_and_staff_to_write() {
        let state = AppState::fake();
        let (admin, regular) = staff_and_regular(&state).await;
        state.catalog.create_category("Крупы").await.unwrap();

        let err = list_products(State(state.clone()), MaybeUser(None), Query(ProductQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = create_product(State(state.clone()), as_user(&regular), Json(oats()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let (status, Json(product)) =
            create_product(State(state.clone()), as_user(&admin), Json(oats()))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(product.calories, 140);
        assert_eq!(product.category, "Крупы");

        let Json(list) = list_products(
            State(state.clone()),
            as_user(&regular),
            Query(ProductQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(list.len(), 1);

        let err = delete_product(State(state.clone()), as_user(&regular), Path(product.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let status = delete_product(State(state), as_user(&admin), Path(product.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn out_of_range_macro_is_a_validation_error() {
        let state = AppState::fake();
        let (admin, _) = staff_and_regular(&state).await;
        state.catalog.create_category("Крупы").await.unwrap();
        let mut body = oats();
        body.proteins = 150;
        let err = create_product(State(state), as_user(&admin), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patch_recomputes_calories_and_filters_apply() {
        let state = AppState::fake();
        let (admin, _) = staff_and_regular(&state).await;
        state.catalog.create_category("Крупы").await.unwrap();
        state.catalog.create_category("Овощи").await.unwrap();
        let (_, Json(product)) = create_product(State(state.clone()), as_user(&admin), Json(oats()))
            .await
            .unwrap();

        let Json(updated) = update_product(
            State(state.clone()),
            as_user(&admin),
            Path(product.id),
            Json(ProductPatch {
                fats: Some(10),
                category: Some("Овощи".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.calories, 120 + 90);
        assert_eq!(updated.category, "Овощи");

        let Json(found) = list_products(
            State(state.clone()),
            as_user(&admin),
            Query(ProductQuery {
                search: Some("овся".into()),
                category: Some("Овощи".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);

        let Json(none) = list_products(
            State(state),
            as_user(&admin),
            Query(ProductQuery {
                search: None,
                category: Some("Крупы".into()),
            }),
        )
        .await
        .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_category_deletes_its_products() {
        let state = AppState::fake();
        let (admin, _) = staff_and_regular(&state).await;
        let category = state.catalog.create_category("Крупы").await.unwrap();
        create_product(State(state.clone()), as_user(&admin), Json(oats()))
            .await
            .unwrap();

        let status = delete_category(State(state.clone()), as_user(&admin), Path(category.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let left = state
            .catalog
            .list_products(&ProductFilter::default())
            .await
            .unwrap();
        assert!(left.is_empty());

        let err = get_category(State(state.clone()), MaybeUser(None), Path(category.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
