use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateUserRequest, UpdateUserRequest};
use crate::{
    auth::{
        dto::{PublicUser, UpdateProfileRequest},
        extractors::CurrentUser,
        services::{create_account, profile_changes},
    },
    error::{AppError, AppResult},
    policy::{authorize, Action, Resource},
    state::AppState,
    validation::validate_username,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, user))]
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    authorize(Some(&user.principal()), Action::List, Resource::User)?;
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, user, body))]
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    authorize(Some(&user.principal()), Action::Create, Resource::User)?;
    let created = create_account(
        state.users.as_ref(),
        &body.username,
        &body.password,
        body.is_staff,
    )
    .await?;
    info!(by = %user.0.id, user_id = %created.id, is_staff = created.is_staff, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(created))))
}

#[instrument(skip(state, user))]
pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    authorize(Some(&user.principal()), Action::Retrieve, Resource::User)?;
    let found = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(PublicUser::from(found)))
}

#[instrument(skip(state, user, body))]
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    authorize(Some(&user.principal()), Action::Update, Resource::User)?;
    let mut changes = profile_changes(UpdateProfileRequest {
        sex: body.sex,
        weight: body.weight,
        height: body.height,
    })?;
    changes.username = body.username.as_deref().map(validate_username).transpose()?;
    changes.is_staff = body.is_staff;

    let updated = state
        .users
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(by = %user.0.id, user_id = %id, "user updated");
    Ok(Json(PublicUser::from(updated)))
}

#[instrument(skip(state, user))]
pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(Some(&user.principal()), Action::Delete, Resource::User)?;
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("user"));
    }
    info!(by = %user.0.id, user_id = %id, "user deleted with their meals");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::staff_and_regular;

    #[tokio::test]
    async fn only_staff_manage_accounts() {
        let state = AppState::fake();
        let (admin, regular) = staff_and_regular(&state).await;

        let err = list_users(State(state.clone()), CurrentUser(regular.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let Json(all) = list_users(State(state.clone()), CurrentUser(admin.clone()))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let (status, Json(created)) = create_user(
            State(state.clone()),
            CurrentUser(admin.clone()),
            Json(CreateUserRequest {
                username: "coach".into(),
                password: "long-password".into(),
                is_staff: true,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.is_staff);

        let err = delete_user(State(state.clone()), CurrentUser(regular), Path(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let status = delete_user(State(state.clone()), CurrentUser(admin.clone()), Path(created.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = get_user(State(state), CurrentUser(admin), Path(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn staff_can_promote_and_rename() {
        let state = AppState::fake();
        let (admin, regular) = staff_and_regular(&state).await;
        let Json(updated) = update_user(
            State(state.clone()),
            CurrentUser(admin.clone()),
            Path(regular.id),
            Json(UpdateUserRequest {
                username: Some("promoted".into()),
                is_staff: Some(true),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert!(updated.is_staff);
        assert_eq!(updated.username, "promoted");

        let err = update_user(
            State(state),
            CurrentUser(admin.clone()),
            Path(regular.id),
            Json(UpdateUserRequest {
                username: Some(admin.username.clone()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
