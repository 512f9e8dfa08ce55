use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use super::repo_types::User;
use crate::{error::AppError, policy::Principal, state::AppState};

/// Validated access token subject. Says nothing about whether the user still exists.
pub struct AuthUser(pub Uuid);

/// Authenticated user, reloaded from the store on every request.
pub struct CurrentUser(pub User);

/// Like [`CurrentUser`], but anonymous requests are let through as `None`.
/// A present but invalid token is still rejected.
pub struct MaybeUser(pub Option<User>);

impl CurrentUser {
    pub fn principal(&self) -> Principal {
        self.0.principal()
    }
}

impl MaybeUser {
    pub fn principal(&self) -> Option<Principal> {
        self.0.as_ref().map(User::principal)
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))
}

fn verify(keys: &JwtKeys, token: &str) -> Result<AuthUser, AppError> {
    match keys.verify_access(token) {
        Ok(claims) => Ok(AuthUser(claims.sub)),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AppError::Unauthorized("Invalid or expired token".into()))
        }
    }
}

async fn load_user(state: &AppState, AuthUser(user_id): AuthUser) -> Result<User, AppError> {
    match state.users.find_by_id(user_id).await? {
        Some(user) => Ok(user),
        None => {
            warn!(%user_id, "token for unknown user");
            Err(AppError::Unauthorized("User not found".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        verify(&JwtKeys::from_ref(state), token)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Ok(CurrentUser(load_user(state, auth).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(MaybeUser(None));
        };
        let auth = verify(&JwtKeys::from_ref(state), token)?;
        Ok(MaybeUser(Some(load_user(state, auth).await?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seed_user;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/meals");
        if let Some(value) = auth {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn current_user_is_reloaded_with_fresh_staff_flag() {
        let state = AppState::fake();
        let user = seed_user(&state, "alice", false).await;
        let token = JwtKeys::from_ref(&state).sign_access(user.id).unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let CurrentUser(loaded) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(!loaded.is_staff);

        state
            .users
            .update(
                user.id,
                crate::auth::repo_types::UserChanges {
                    is_staff: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let current = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(current.principal().is_staff);
    }

    #[tokio::test]
    async fn missing_or_bad_tokens_are_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &state).await,
            Err(AppError::Unauthorized(_))
        ));

        let mut parts = parts_with(Some("Basic abc"));
        assert!(CurrentUser::from_request_parts(&mut parts, &state).await.is_err());

        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        assert!(MaybeUser::from_request_parts(&mut parts, &state).await.is_err());
    }

    #[tokio::test]
    async fn anonymous_requests_pass_as_none_but_refresh_tokens_do_not() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());

        let bob = seed_user(&state, "bob", false).await;
        let refresh = JwtKeys::from_ref(&state).sign_refresh(bob.id).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {refresh}")));
        assert!(MaybeUser::from_request_parts(&mut parts, &state).await.is_err());
    }

    #[tokio::test]
    async fn deleted_user_token_is_rejected() {
        let state = AppState::fake();
        let carol = seed_user(&state, "carol", false).await;
        let token = JwtKeys::from_ref(&state).sign_access(carol.id).unwrap();
        state.users.delete(carol.id).await.unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &state).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
