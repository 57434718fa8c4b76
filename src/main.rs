//! Taskpad - Multi-user Task Tracking Backend
//! Mission: Token-pair authentication and owner-scoped todo CRUD

use anyhow::{Context, Result};
use chrono::Duration;
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskpad_backend::auth::{JwtHandler, UserStore};
use taskpad_backend::storage;
use taskpad_backend::todos::TodoStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    info!("🚀 Taskpad Backend Starting");

    let db_path = resolve_data_path(env::var("TASKPAD_DB_PATH").ok(), "taskpad.db");
    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("⚠️  JWT_SECRET not set, using development default. SET IT IN PRODUCTION!");
        "dev-secret-change-in-production-minimum-32-characters".to_string()
    });
    let access_minutes = env_i64("ACCESS_TOKEN_MINUTES", 5);
    let refresh_hours = env_i64("REFRESH_TOKEN_HOURS", 24);

    let db = storage::open_database(&db_path)?;
    // The todos table's owner foreign key targets the users table, so the
    // user store initializes first.
    let user_store = Arc::new(UserStore::new(db.clone()).await?);
    let todo_store = Arc::new(TodoStore::new(db).await?);
    let jwt_handler = Arc::new(JwtHandler::with_lifetimes(
        jwt_secret,
        Duration::minutes(access_minutes),
        Duration::hours(refresh_hours),
    ));

    info!("💾 Database at: {}", db_path);
    info!(
        "🔐 Token lifetimes: access {}m, refresh {}h",
        access_minutes, refresh_hours
    );

    let app = taskpad_backend::app(user_store, todo_store, jwt_handler);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskpad_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn env_i64(var: &str, default: i64) -> i64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_data_path(filename: &str) -> String {
    // Anchor defaults to the crate directory, not the caller's cwd
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    // Treat relative paths as relative to the crate directory
    base.join(p).to_string_lossy().to_string()
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory's .env (common when running with
    //    --manifest-path from elsewhere)
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
