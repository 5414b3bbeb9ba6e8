// src/main.rs
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use poll_vote_backend::config::Config;
use poll_vote_backend::db;
use poll_vote_backend::engine::PollEngine;
use poll_vote_backend::routes::{self, AppState};
use poll_vote_backend::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Load environment variables from .env file

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("poll_vote_backend=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, &config).await?;
            db::migrate(&pool).await?;
            info!(max_connections = config.max_connections, "connected to postgres");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; polls and votes are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let routes = routes::create_routes(AppState::new(PollEngine::new(store)));

    let addr = config.bind_addr();
    info!(%addr, "listening");
    axum_server::bind(addr)
        .serve(routes.into_make_service())
        .await?;

    Ok(())
}
