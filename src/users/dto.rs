use serde::Deserialize;

use crate::auth::repo_types::Sex;

/// Account created by staff on behalf of someone else.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// Staff-side edit of any account. Absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub is_staff: Option<bool>,
    pub sex: Option<Sex>,
    pub weight: Option<f64>,
    pub height: Option<i32>,
}
