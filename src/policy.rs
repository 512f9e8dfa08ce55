//! Access rules for every resource the API exposes.
//!
//! Decisions are recomputed on every request from the principal as freshly
//! loaded from the user store; nothing here caches a decision.

use uuid::Uuid;

use crate::error::AppError;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    /// List and retrieve never mutate anything.
    pub fn is_safe(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Category,
    Product,
    /// The meal collection itself: listing and logging new meals.
    Meals,
    Meal { owner: Uuid },
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
}

pub fn is_owner_or_staff(principal: &Principal, owner: Uuid) -> bool {
    owner == principal.id || principal.is_staff
}

pub fn is_admin_or_read_only(principal: &Principal, action: Action) -> bool {
    action.is_safe() || principal.is_staff
}

pub fn decide(principal: Option<&Principal>, action: Action, resource: Resource) -> Decision {
    let allow = |ok: bool| if ok { Decision::Allow } else { Decision::Forbidden };

    match (resource, principal) {
        (Resource::Category, _) if action.is_safe() => Decision::Allow,
        (_, None) => Decision::Unauthenticated,
        (Resource::Category | Resource::Product, Some(p)) => allow(is_admin_or_read_only(p, action)),
        (Resource::Meals, Some(_)) => allow(matches!(action, Action::List | Action::Create)),
        (Resource::Meal { owner }, Some(p)) => allow(is_owner_or_staff(p, owner)),
        (Resource::User, Some(p)) => allow(p.is_staff),
    }
}

pub fn can_read(principal: Option<&Principal>, resource: Resource) -> bool {
    decide(principal, Action::Retrieve, resource) == Decision::Allow
}

pub fn can_write(principal: Option<&Principal>, action: Action, resource: Resource) -> bool {
    decide(principal, action, resource) == Decision::Allow
}

pub fn authorize(
    principal: Option<&Principal>,
    action: Action,
    resource: Resource,
) -> Result<(), AppError> {
    match decide(principal, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(AppError::Unauthorized("authentication required".into())),
        Decision::Forbidden => Err(AppError::PermissionDenied),
    }
}
