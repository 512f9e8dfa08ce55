mod app;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod meals;
mod memory;
mod nutrition;
mod policy;
mod state;
mod users;
mod validation;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutrition_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;

    if let Some(admin) = &state.config.admin {
        auth::services::ensure_admin(state.users.as_ref(), admin).await?;
    }

    let config = state.config.clone();
    let app = app::build_app(state);
    app::serve(app, &config).await
}
