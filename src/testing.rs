use crate::auth::repo_types::{NewUser, User};
use crate::state::AppState;

/// Stores a user directly, skipping password hashing.
pub async fn seed_user(state: &AppState, username: &str, is_staff: bool) -> User {
    state
        .users
        .create(NewUser {
            username: username.into(),
            password_hash: "unused-hash".into(),
            is_staff,
        })
        .await
        .expect("seed user")
}

/// Returns `(staff, regular)`, named "admin" and "alice".
pub async fn staff_and_regular(state: &AppState) -> (User, User) {
    let admin = seed_user(state, "admin", true).await;
    let alice = seed_user(state, "alice", false).await;
    (admin, alice)
}
