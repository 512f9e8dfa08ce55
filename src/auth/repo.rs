use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserChanges, UserRow};
use crate::db::{classify, PgStore};
use crate::error::RepoResult;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Fails with `RepoError::Conflict` when the username is taken.
    async fn create(&self, new: NewUser) -> RepoResult<User>;
    async fn list(&self) -> RepoResult<Vec<User>>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>>;
    /// Deletes the user together with their meals.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, is_staff, sex, weight_kg, height_cm, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, is_staff, sex, weight_kg, height_cm, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, is_staff, sex, weight_kg, height_cm, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.is_staff)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "username", "user"))?;
        Ok(User::try_from(row)?)
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, is_staff, sex, weight_kg, height_cm, created_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                username  = COALESCE($2, username),
                is_staff  = COALESCE($3, is_staff),
                sex       = COALESCE($4, sex),
                weight_kg = COALESCE($5, weight_kg),
                height_cm = COALESCE($6, height_cm)
            WHERE id = $1
            RETURNING id, username, password_hash, is_staff, sex, weight_kg, height_cm, created_at
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.is_staff)
        .bind(changes.sex.map(|s| s.as_str()))
        .bind(changes.weight_kg)
        .bind(changes.height_cm)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "username", "user"))?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}
