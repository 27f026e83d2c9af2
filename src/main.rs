use std::sync::Arc;

use anyhow::Context;

use foodshare::{app, config::AppConfig, db::postgres::PgStore, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foodshare=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env().context("load configuration")?;
    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    tracing::info!("database schema up to date");

    let addr = config.listen_addr()?;
    let state = AppState::from_parts(Arc::new(store), Arc::new(config));
    app::serve(app::build_app(state), addr).await
}
