use std::time::Duration;

mod app;
mod auth;
mod config;
mod error;
mod mailer;
mod posts;
mod state;
mod storage;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "othousing=debug,axum=info,tower_http=info".to_string());
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

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    spawn_retention_sweep(&app_state);

    let app = app::build_app(app_state);
    app::serve(app).await
}

/// Hourly deletion of posts past the retention window. Disabled when the
/// configured window is zero.
fn spawn_retention_sweep(state: &AppState) {
    let days = state.config.post_retention_days;
    if days <= 0 {
        tracing::info!("post retention sweep disabled");
        return;
    }
    let db = state.db.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            tick.tick().await;
            match crate::posts::repo::Post::delete_older_than(&db, days).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(swept = n, retention_days = days, "expired posts removed"),
                Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
            }
        }
    });
}
