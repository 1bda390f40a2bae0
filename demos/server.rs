//! Demo server: reads `entities.json`, creates the auth and entity tables, and serves
//! the site, REST and admin surfaces.
//!
//! `KERNEL_CONFIG_PATH=demos/entities.json cargo run --example server`

use kernel_sdk::{
    app, apply_migrations, ensure_auth_tables, ensure_database_exists, load_from_path, resolve, AppState,
    PgPermissionBackend, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kernel_sdk=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    let config = load_from_path(&settings.config_path).await?;
    let model = resolve(&config, &settings.schema)?;
    ensure_auth_tables(&pool, &settings.schema).await?;
    apply_migrations(&pool, &model).await?;

    let permissions = Arc::new(PgPermissionBackend::new(pool.clone(), settings.schema.clone()));
    let bind_addr = settings.bind_addr;
    let state = AppState::new(pool, model, permissions, settings);
    let router = app(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
