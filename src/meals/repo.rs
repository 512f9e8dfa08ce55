use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{classify, PgStore};
use crate::error::{RepoError, RepoResult};
use crate::meals::repo_types::{Meal, MealEntry, MealName, MealRow, NewEntry};

#[async_trait]
pub trait MealRepo: Send + Sync {
    /// Newest first, later insertions first on equal timestamps.
    /// `owner = None` lists every user's meals.
    async fn list_meals(&self, owner: Option<Uuid>, limit: i64, offset: i64)
        -> RepoResult<Vec<Meal>>;
    /// Every meal of `owner`, oldest first with ties in insertion order,
    /// optionally only those created in `[from, to)`.
    async fn owner_meals(
        &self,
        owner: Uuid,
        window: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> RepoResult<Vec<Meal>>;
    async fn get_meal(&self, id: Uuid) -> RepoResult<Option<Meal>>;
    /// Inserts the meal and its entries atomically. An unknown product fails
    /// the whole call with `RepoError::Missing("product")`.
    async fn create_meal(
        &self,
        owner: Uuid,
        name: MealName,
        entries: &[NewEntry],
    ) -> RepoResult<(Meal, Vec<MealEntry>)>;
    async fn rename_meal(&self, id: Uuid, name: MealName) -> RepoResult<Option<Meal>>;
    async fn delete_meal(&self, id: Uuid) -> RepoResult<bool>;

    /// Entries of all given meals in insertion order.
    async fn entries_for_meals(&self, meal_ids: &[Uuid]) -> RepoResult<Vec<MealEntry>>;
    async fn add_entries(&self, meal_id: Uuid, entries: &[NewEntry]) -> RepoResult<Vec<MealEntry>>;
    async fn update_entry(
        &self,
        meal_id: Uuid,
        entry_id: Uuid,
        weight_grams: f64,
    ) -> RepoResult<Option<MealEntry>>;
    async fn remove_entry(&self, meal_id: Uuid, entry_id: Uuid) -> RepoResult<bool>;
}

const MEAL_COLUMNS: &str = "id, owner_id, name, created_at";

async fn insert_entries(
    tx: &mut Transaction<'_, Postgres>,
    meal_id: Uuid,
    entries: &[NewEntry],
) -> RepoResult<Vec<MealEntry>> {
    let mut inserted = Vec::with_capacity(entries.len());
    for entry in entries {
        let row = sqlx::query_as::<_, MealEntry>(
            r#"
            INSERT INTO meal_entries (id, meal_id, product_id, weight_grams)
            VALUES ($1, $2, $3, $4)
            RETURNING id, meal_id, product_id, weight_grams
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(meal_id)
        .bind(entry.product_id)
        .bind(entry.weight_grams)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| classify(e, "entry", "product"))?;
        inserted.push(row);
    }
    Ok(inserted)
}

fn into_meals(rows: Vec<MealRow>) -> RepoResult<Vec<Meal>> {
    Ok(rows
        .into_iter()
        .map(Meal::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?)
}

#[async_trait]
impl MealRepo for PgStore {
    async fn list_meals(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Meal>> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at DESC, seq DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list meals")?;
        into_meals(rows)
    }

    async fn owner_meals(
        &self,
        owner: Uuid,
        window: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> RepoResult<Vec<Meal>> {
        let (from, to) = window.unzip();
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meals
            WHERE owner_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at, seq
            "#
        ))
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .context("list owner meals")?;
        into_meals(rows)
    }

    async fn get_meal(&self, id: Uuid) -> RepoResult<Option<Meal>> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get meal")?;
        Ok(row.map(Meal::try_from).transpose()?)
    }

    async fn create_meal(
        &self,
        owner: Uuid,
        name: MealName,
        entries: &[NewEntry],
    ) -> RepoResult<(Meal, Vec<MealEntry>)> {
        let mut tx = self.db.begin().await.context("begin meal tx")?;

        let row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            INSERT INTO meals (id, owner_id, name)
            VALUES ($1, $2, $3)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(name.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, "meal", "user"))?;
        let meal = Meal::try_from(row)?;

        let inserted = insert_entries(&mut tx, meal.id, entries).await?;
        tx.commit().await.context("commit meal tx")?;
        Ok((meal, inserted))
    }

    async fn rename_meal(&self, id: Uuid, name: MealName) -> RepoResult<Option<Meal>> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "UPDATE meals SET name = $2 WHERE id = $1 RETURNING {MEAL_COLUMNS}"
        ))
        .bind(id)
        .bind(name.as_str())
        .fetch_optional(&self.db)
        .await
        .context("rename meal")?;
        Ok(row.map(Meal::try_from).transpose()?)
    }

    async fn delete_meal(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete meal")?;
        Ok(res.rows_affected() > 0)
    }

    async fn entries_for_meals(&self, meal_ids: &[Uuid]) -> RepoResult<Vec<MealEntry>> {
        if meal_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, MealEntry>(
            r#"
            SELECT id, meal_id, product_id, weight_grams
            FROM meal_entries
            WHERE meal_id = ANY($1)
            ORDER BY seq
            "#,
        )
        .bind(meal_ids)
        .fetch_all(&self.db)
        .await
        .context("load meal entries")?;
        Ok(rows)
    }

    async fn add_entries(&self, meal_id: Uuid, entries: &[NewEntry]) -> RepoResult<Vec<MealEntry>> {
        let mut tx = self.db.begin().await.context("begin entries tx")?;
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM meals WHERE id = $1 FOR UPDATE")
            .bind(meal_id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock meal")?;
        if exists.is_none() {
            return Err(RepoError::Missing("meal"));
        }
        let inserted = insert_entries(&mut tx, meal_id, entries).await?;
        tx.commit().await.context("commit entries tx")?;
        Ok(inserted)
    }

    async fn update_entry(
        &self,
        meal_id: Uuid,
        entry_id: Uuid,
        weight_grams: f64,
    ) -> RepoResult<Option<MealEntry>> {
        let row = sqlx::query_as::<_, MealEntry>(
            r#"
            UPDATE meal_entries SET weight_grams = $3
            WHERE id = $2 AND meal_id = $1
            RETURNING id, meal_id, product_id, weight_grams
            "#,
        )
        .bind(meal_id)
        .bind(entry_id)
        .bind(weight_grams)
        .fetch_optional(&self.db)
        .await
        .context("update meal entry")?;
        Ok(row)
    }

    async fn remove_entry(&self, meal_id: Uuid, entry_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM meal_entries WHERE id = $2 AND meal_id = $1")
            .bind(meal_id)
            .bind(entry_id)
            .execute(&self.db)
            .await
            .context("remove meal entry")?;
        Ok(res.rows_affected() > 0)
    }
}
