//! Process-local store used for tests and `STORE=memory` runs.
//!
//! Mirrors the Postgres schema's constraints: unique names, foreign keys and
//! cascading deletes are enforced by hand under a single lock.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::catalog::repo::CatalogRepo;
use crate::catalog::repo_types::{Category, NewProduct, Product, ProductFilter};
use crate::error::{RepoError, RepoResult};
use crate::meals::repo::MealRepo;
use crate::meals::repo_types::{Meal, MealEntry, MealName, NewEntry};
use crate::nutrition::Macros;

#[derive(Debug, Clone)]
struct StoredProduct {
    id: Uuid,
    name: String,
    macros: Macros,
    category_id: Uuid,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<StoredProduct>,
    meals: Vec<Meal>,
    /// Kept in insertion order.
    entries: Vec<MealEntry>,
}

impl MemoryState {
    fn category_name(&self, id: Uuid) -> RepoResult<String> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .ok_or(RepoError::Missing("category"))
    }

    fn resolve(&self, p: &StoredProduct) -> RepoResult<Product> {
        Ok(Product {
            id: p.id,
            name: p.name.clone(),
            macros: p.macros,
            category_id: p.category_id,
            category: self.category_name(p.category_id)?,
        })
    }

    fn check_entries(&self, entries: &[NewEntry]) -> RepoResult<()> {
        for entry in entries {
            if !self.products.iter().any(|p| p.id == entry.product_id) {
                return Err(RepoError::Missing("product"));
            }
        }
        Ok(())
    }

    fn push_entries(&mut self, meal_id: Uuid, entries: &[NewEntry]) -> Vec<MealEntry> {
        let inserted: Vec<MealEntry> = entries
            .iter()
            .map(|e| MealEntry {
                id: Uuid::new_v4(),
                meal_id,
                product_id: e.product_id,
                weight_grams: e.weight_grams,
            })
            .collect();
        self.entries.extend(inserted.iter().cloned());
        inserted
    }

    fn drop_products(&mut self, doomed: &[Uuid]) {
        self.products.retain(|p| !doomed.contains(&p.id));
        self.entries.retain(|e| !doomed.contains(&e.product_id));
    }

    fn drop_meals(&mut self, doomed: &[Uuid]) {
        self.meals.retain(|m| !doomed.contains(&m.id));
        self.entries.retain(|e| !doomed.contains(&e.meal_id));
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryState>,
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let st = self.inner.read().await;
        Ok(st.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let st = self.inner.read().await;
        Ok(st.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut st = self.inner.write().await;
        if st.users.iter().any(|u| u.username == new.username) {
            return Err(RepoError::Conflict("username"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password_hash: new.password_hash,
            is_staff: new.is_staff,
            sex: None,
            weight_kg: None,
            height_cm: None,
            created_at: OffsetDateTime::now_utc(),
        };
        st.users.push(user.clone());
        Ok(user)
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let st = self.inner.read().await;
        let mut users = st.users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut st = self.inner.write().await;
        if let Some(name) = &changes.username {
            if st.users.iter().any(|u| u.id != id && &u.username == name) {
                return Err(RepoError::Conflict("username"));
            }
        }
        let Some(user) = st.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(is_staff) = changes.is_staff {
            user.is_staff = is_staff;
        }
        if changes.sex.is_some() {
            user.sex = changes.sex;
        }
        if changes.weight_kg.is_some() {
            user.weight_kg = changes.weight_kg;
        }
        if changes.height_cm.is_some() {
            user.height_cm = changes.height_cm;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut st = self.inner.write().await;
        let before = st.users.len();
        st.users.retain(|u| u.id != id);
        if st.users.len() == before {
            return Ok(false);
        }
        let doomed: Vec<Uuid> = st
            .meals
            .iter()
            .filter(|m| m.owner_id == id)
            .map(|m| m.id)
            .collect();
        st.drop_meals(&doomed);
        Ok(true)
    }
}

#[async_trait]
impl CatalogRepo for MemoryStore {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let st = self.inner.read().await;
        let mut categories = st.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let st = self.inner.read().await;
        Ok(st.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        let st = self.inner.read().await;
        Ok(st.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        let mut st = self.inner.write().await;
        if st.categories.iter().any(|c| c.name == name) {
            return Err(RepoError::Conflict("category"));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        st.categories.push(category.clone());
        Ok(category)
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>> {
        let mut st = self.inner.write().await;
        if st.categories.iter().any(|c| c.id != id && c.name == name) {
            return Err(RepoError::Conflict("category"));
        }
        Ok(st.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name.to_string();
            c.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let mut st = self.inner.write().await;
        let before = st.categories.len();
        st.categories.retain(|c| c.id != id);
        if st.categories.len() == before {
            return Ok(false);
        }
        let doomed: Vec<Uuid> = st
            .products
            .iter()
            .filter(|p| p.category_id == id)
            .map(|p| p.id)
            .collect();
        st.drop_products(&doomed);
        Ok(true)
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        let st = self.inner.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut products = Vec::new();
        for p in &st.products {
            if let Some(needle) = &needle {
                if !p.name.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            let product = st.resolve(p)?;
            if let Some(category) = &filter.category {
                if &product.category != category {
                    continue;
                }
            }
            products.push(product);
        }
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let st = self.inner.read().await;
        st.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| st.resolve(p))
            .transpose()
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<Product>> {
        let st = self.inner.read().await;
        st.products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| st.resolve(p))
            .collect()
    }

    async fn create_product(&self, new: NewProduct) -> RepoResult<Product> {
        let mut st = self.inner.write().await;
        st.category_name(new.category_id)?;
        if st.products.iter().any(|p| p.name == new.name) {
            return Err(RepoError::Conflict("product"));
        }
        let stored = StoredProduct {
            id: Uuid::new_v4(),
            name: new.name,
            macros: new.macros,
            category_id: new.category_id,
        };
        let product = st.resolve(&stored)?;
        st.products.push(stored);
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, product: NewProduct) -> RepoResult<Option<Product>> {
        let mut st = self.inner.write().await;
        st.category_name(product.category_id)?;
        if st.products.iter().any(|p| p.id != id && p.name == product.name) {
            return Err(RepoError::Conflict("product"));
        }
        let Some(stored) = st.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        stored.name = product.name;
        stored.macros = product.macros;
        stored.category_id = product.category_id;
        let stored = stored.clone();
        st.resolve(&stored).map(Some)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let mut st = self.inner.write().await;
        let existed = st.products.iter().any(|p| p.id == id);
        st.drop_products(&[id]);
        Ok(existed)
    }
}

#[async_trait]
impl MealRepo for MemoryStore {
    async fn list_meals(
        &self,
        owner: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Meal>> {
        let st = self.inner.read().await;
        let mut meals: Vec<Meal> = st
            .meals
            .iter()
            .filter(|m| owner.map_or(true, |o| m.owner_id == o))
            .cloned()
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        meals.reverse();
        meals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(meals
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn owner_meals(
        &self,
        owner: Uuid,
        window: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> RepoResult<Vec<Meal>> {
        let st = self.inner.read().await;
        let in_window = |at: OffsetDateTime| window.map_or(true, |(from, to)| at >= from && at < to);
        let mut meals: Vec<Meal> = st
            .meals
            .iter()
            .filter(|m| m.owner_id == owner && in_window(m.created_at))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep insertion order.
        meals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(meals)
    }

    async fn get_meal(&self, id: Uuid) -> RepoResult<Option<Meal>> {
        let st = self.inner.read().await;
        Ok(st.meals.iter().find(|m| m.id == id).cloned())
    }

    async fn create_meal(
        &self,
        owner: Uuid,
        name: MealName,
        entries: &[NewEntry],
    ) -> RepoResult<(Meal, Vec<MealEntry>)> {
        let mut st = self.inner.write().await;
        if !st.users.iter().any(|u| u.id == owner) {
            return Err(RepoError::Missing("user"));
        }
        st.check_entries(entries)?;
        let meal = Meal {
            id: Uuid::new_v4(),
            owner_id: owner,
            name,
            created_at: OffsetDateTime::now_utc(),
        };
        st.meals.push(meal.clone());
        let inserted = st.push_entries(meal.id, entries);
        Ok((meal, inserted))
    }

    async fn rename_meal(&self, id: Uuid, name: MealName) -> RepoResult<Option<Meal>> {
        let mut st = self.inner.write().await;
        Ok(st.meals.iter_mut().find(|m| m.id == id).map(|m| {
            m.name = name;
            m.clone()
        }))
    }

    async fn delete_meal(&self, id: Uuid) -> RepoResult<bool> {
        let mut st = self.inner.write().await;
        let existed = st.meals.iter().any(|m| m.id == id);
        st.drop_meals(&[id]);
        Ok(existed)
    }

    async fn entries_for_meals(&self, meal_ids: &[Uuid]) -> RepoResult<Vec<MealEntry>> {
        let st = self.inner.read().await;
        Ok(st
            .entries
            .iter()
            .filter(|e| meal_ids.contains(&e.meal_id))
            .cloned()
            .collect())
    }

    async fn add_entries(&self, meal_id: Uuid, entries: &[NewEntry]) -> RepoResult<Vec<MealEntry>> {
        let mut st = self.inner.write().await;
        if !st.meals.iter().any(|m| m.id == meal_id) {
            return Err(RepoError::Missing("meal"));
        }
        st.check_entries(entries)?;
        Ok(st.push_entries(meal_id, entries))
    }

    async fn update_entry(
        &self,
        meal_id: Uuid,
        entry_id: Uuid,
        weight_grams: f64,
    ) -> RepoResult<Option<MealEntry>> {
        let mut st = self.inner.write().await;
        Ok(st
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id && e.meal_id == meal_id)
            .map(|e| {
                e.weight_grams = weight_grams;
                e.clone()
            }))
    }

    async fn remove_entry(&self, meal_id: Uuid, entry_id: Uuid) -> RepoResult<bool> {
        let mut st = self.inner.write().await;
        let before = st.entries.len();
        st.entries
            .retain(|e| !(e.id == entry_id && e.meal_id == meal_id));
        Ok(st.entries.len() != before)
    }
}
