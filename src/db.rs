use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{config::AppConfig, error::RepoError};

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pub db: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is not set")?;
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("database migrations applied");

        Ok(Self { db })
    }
}

/// Maps constraint violations onto typed repository errors. `unique` names
/// the value whose uniqueness is enforced, `referenced` the row a foreign key
/// points at.
pub(crate) fn classify(e: sqlx::Error, unique: &'static str, referenced: &'static str) -> RepoError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return RepoError::Conflict(unique);
        }
        if db_err.is_foreign_key_violation() {
            return RepoError::Missing(referenced);
        }
    }
    RepoError::Other(anyhow::Error::new(e))
}
