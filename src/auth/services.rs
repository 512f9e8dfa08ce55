use tracing::{info, instrument, warn};

use super::dto::{AuthResponse, PublicUser, UpdateProfileRequest};
use super::jwt::JwtKeys;
use super::password::hash_password_blocking;
use super::repo::UserRepo;
use super::repo_types::{NewUser, User, UserChanges};
use crate::config::AdminBootstrap;
use crate::error::{AppError, AppResult, RepoError};
use crate::validation::{
    validate_body_weight, validate_height, validate_password, validate_username,
};

pub fn issue_tokens(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

/// Validates credentials and stores a new user with a hashed password.
pub async fn create_account(
    users: &dyn UserRepo,
    username: &str,
    password: &str,
    is_staff: bool,
) -> AppResult<User> {
    let username = validate_username(username)?;
    validate_password(password)?;

    if users.find_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("username already taken".into()));
    }
    let password_hash = hash_password_blocking(password.to_string()).await?;
    let user = users
        .create(NewUser {
            username,
            password_hash,
            is_staff,
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => AppError::Conflict("username already taken".into()),
            other => other.into(),
        })?;
    Ok(user)
}

pub fn profile_changes(body: UpdateProfileRequest) -> AppResult<UserChanges> {
    Ok(UserChanges {
        sex: body.sex,
        weight_kg: body.weight.map(validate_body_weight).transpose()?,
        height_cm: body.height.map(validate_height).transpose()?,
        ..Default::default()
    })
}

/// Creates the configured staff account unless a user with that name exists.
#[instrument(skip(users, admin), fields(username = %admin.username))]
pub async fn ensure_admin(users: &dyn UserRepo, admin: &AdminBootstrap) -> AppResult<()> {
    if let Some(existing) = users.find_by_username(admin.username.trim()).await? {
        if !existing.is_staff {
            warn!(
                user_id = %existing.id,
                "bootstrap admin exists without staff flag; leaving it untouched"
            );
        }
        return Ok(());
    }
    let user = create_account(users, &admin.username, &admin.password, true).await?;
    info!(user_id = %user.id, "bootstrap admin created");
    Ok(())
}
