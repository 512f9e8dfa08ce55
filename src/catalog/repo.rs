use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::repo_types::{Category, NewProduct, Product, ProductFilter, ProductRow};
use crate::db::{classify, PgStore};
use crate::error::RepoResult;

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>>;
    async fn create_category(&self, name: &str) -> RepoResult<Category>;
    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>>;
    /// Deletes the category, its products and every meal entry that used them.
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    /// Products ordered by name.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    /// Products among `ids` that still exist; missing ids are simply absent.
    async fn products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>>;
    async fn create_product(&self, new: NewProduct) -> RepoResult<Product>;
    async fn update_product(&self, id: Uuid, product: NewProduct) -> RepoResult<Option<Product>>;
    /// Deletes the product and every meal entry that used it.
    async fn delete_product(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
impl CatalogRepo for PgStore {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name FROM product_categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name FROM product_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get category")?;
        Ok(row)
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name FROM product_categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("find category by name")?;
        Ok(row)
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO product_categories (id, name)
            VALUES ($1, $2)
            RETURNING id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "category", "category"))?;
        Ok(row)
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE product_categories SET name = $2
            WHERE id = $1
            RETURNING id, name
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "category", "category"))?;
        Ok(row)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        // products and meal_entries go with it through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM product_categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete category")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.proteins, p.fats, p.carbs, p.category_id, c.name AS category
            FROM products p
            JOIN product_categories c ON c.id = p.category_id
            WHERE ($1::text IS NULL OR strpos(lower(p.name), lower($1)) > 0)
              AND ($2::text IS NULL OR c.name = $2)
            ORDER BY p.name
            "#,
        )
        .bind(filter.search.as_deref())
        .bind(filter.category.as_deref())
        .fetch_all(&self.db)
        .await
        .context("list products")?;
        Ok(rows
            .into_iter()
            .map(Product::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.proteins, p.fats, p.carbs, p.category_id, c.name AS category
            FROM products p
            JOIN product_categories c ON c.id = p.category_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get product")?;
        Ok(row.map(Product::try_from).transpose()?)
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.proteins, p.fats, p.carbs, p.category_id, c.name AS category
            FROM products p
            JOIN product_categories c ON c.id = p.category_id
            WHERE p.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("products by ids")?;
        Ok(rows
            .into_iter()
            .map(Product::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn create_product(&self, new: NewProduct) -> RepoResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            WITH inserted AS (
                INSERT INTO products (id, name, proteins, fats, carbs, category_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, name, proteins, fats, carbs, category_id
            )
            SELECT i.id, i.name, i.proteins, i.fats, i.carbs, i.category_id, c.name AS category
            FROM inserted i
            JOIN product_categories c ON c.id = i.category_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(i16::from(new.macros.proteins()))
        .bind(i16::from(new.macros.fats()))
        .bind(i16::from(new.macros.carbs()))
        .bind(new.category_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "product", "category"))?;
        Ok(Product::try_from(row)?)
    }

    async fn update_product(&self, id: Uuid, product: NewProduct) -> RepoResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            WITH updated AS (
                UPDATE products
                SET name = $2, proteins = $3, fats = $4, carbs = $5, category_id = $6
                WHERE id = $1
                RETURNING id, name, proteins, fats, carbs, category_id
            )
            SELECT u.id, u.name, u.proteins, u.fats, u.carbs, u.category_id, c.name AS category
            FROM updated u
            JOIN product_categories c ON c.id = u.category_id
            "#,
        )
        .bind(id)
        .bind(&product.name)
        .bind(i16::from(product.macros.proteins()))
        .bind(i16::from(product.macros.fats()))
        .bind(i16::from(product.macros.carbs()))
        .bind(product.category_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "product", "category"))?;
        Ok(row.map(Product::try_from).transpose()?)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete product")?;
        Ok(res.rows_affected() > 0)
    }
}
