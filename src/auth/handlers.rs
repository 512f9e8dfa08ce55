use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            UpdateProfileRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::verify_password_blocking,
        services::{create_account, issue_tokens, profile_changes},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = create_account(
        state.users.as_ref(),
        &payload.username,
        &payload.password,
        false,
    )
    .await
    .inspect_err(|e| warn!(error = %e, "registration rejected"))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    let keys = JwtKeys::from_ref(&state);
    Ok((StatusCode::CREATED, Json(issue_tokens(&keys, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let username = payload.username.trim();
    let Some(user) = state.users.find_by_username(username).await? else {
        warn!(%username, "login unknown username");
        return Err(invalid_credentials());
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(%username, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, %username, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(user))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(user))
}

#[instrument(skip(state, user, body))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    let changes = profile_changes(body)?;
    let updated = state
        .users
        .update(user.id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(PublicUser::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Sex;

    fn creds(username: &str, password: &str) -> (String, String) {
        (username.to_string(), password.to_string())
    }

    #[tokio::test]
    async fn register_login_refresh_flow() {
        let state = AppState::fake();
        let (username, password) = creds("alice", "correct-horse");

        let (status, Json(registered)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                username: username.clone(),
                password: password.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(!registered.user.is_staff);

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                username: username.clone(),
                password: "wrong-password".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let Json(logged_in) = login(
            State(state.clone()),
            Json(LoginRequest { username, password }),
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let Json(refreshed) = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: logged_in.refresh_token,
            }),
        )
        .await
        .unwrap();
        assert_eq!(refreshed.user.username, "alice");

        let err = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: refreshed.access_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let state = AppState::fake();
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let res = register(
                State(state.clone()),
                Json(RegisterRequest {
                    username: "bob".into(),
                    password: "long-enough".into(),
                }),
            )
            .await;
            match res {
                Ok((status, _)) => assert_eq!(status, expected),
                Err(e) => assert_eq!(e.status(), expected),
            }
        }
    }

    #[tokio::test]
    async fn profile_update_applies_validated_fields() {
        let state = AppState::fake();
        let user = crate::testing::seed_user(&state, "dana", false).await;
        let Json(me) = update_me(
            State(state.clone()),
            CurrentUser(user.clone()),
            Json(UpdateProfileRequest {
                sex: Some(Sex::Female),
                weight: Some(61.04),
                height: Some(168),
            }),
        )
        .await
        .unwrap();
        assert_eq!(me.sex, Some(Sex::Female));
        assert_eq!(me.weight, Some(61.0));
        assert_eq!(me.height, Some(168));

        let err = update_me(
            State(state),
            CurrentUser(user),
            Json(UpdateProfileRequest {
                weight: Some(-1.0),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn public_user_hides_password_hash() {
        let user = crate::auth::repo_types::User {
            id: uuid::Uuid::new_v4(),
            username: "erin".into(),
            password_hash: "secret-hash".into(),
            is_staff: false,
            sex: None,
            weight_kg: None,
            height_cm: None,
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("erin"));
        assert!(!json.contains("secret-hash"));
    }
}
