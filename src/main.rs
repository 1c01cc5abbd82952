mod api;
mod config;
mod db;
mod error;
mod extractor;
mod fetcher;
mod ranker;
mod scorer;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    if cfg.ad_account_id.is_none() {
        warn!("META_AD_ACCOUNT_ID not set — insight endpoints will return 400 until configured");
    }
    if cfg.access_token.is_none() {
        warn!("META_ACCESS_TOKEN not set — insight endpoints will return 401 until configured");
    }

    let client = fetcher::build_client()?;
    let api_state = ApiState {
        pool,
        cfg: Arc::new(cfg.clone()),
        client,
    };
    let app = router(api_state);

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
