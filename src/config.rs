use crate::error::{AppError, Result};

pub const GRAPH_API_URL: &str = "https://graph.facebook.com/v23.0";

/// Clamp range for the `days` lookback query parameter.
pub const DAYS_MIN: u32 = 1;
pub const DAYS_MAX: u32 = 90;

/// Clamp range for the upstream fetch `limit` query parameter.
pub const FETCH_LIMIT_MIN: usize = 1;
pub const FETCH_LIMIT_MAX: usize = 5000;

/// Default fetch limits when the caller does not pass one.
pub const FETCH_LIMIT_DEFAULT: usize = 500;
pub const INGEST_FETCH_LIMIT_DEFAULT: usize = 1000;
pub const LISTING_FETCH_LIMIT_DEFAULT: usize = 200;

/// Result page sizes returned by the ranking and ingest endpoints.
pub const RANKED_PAGE_SIZE: usize = 50;
pub const INGEST_PAGE_SIZE: usize = 200;

/// Rows per INSERT statement when persisting scored metrics.
pub const PERSIST_BATCH_SIZE: usize = 200;

/// Upstream request timeout (seconds).
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Backoff before the single retry of a transient upstream failure (milliseconds).
pub const UPSTREAM_RETRY_BACKOFF_MS: u64 = 500;

/// Beta-binomial prior pseudo-counts and LCB confidence multiplier.
pub mod priors {
    pub const ALPHA_CTR: f64 = 2.0;
    pub const BETA_CTR: f64 = 200.0;
    pub const ALPHA_CVR: f64 = 2.0;
    pub const BETA_CVR: f64 = 50.0;
    pub const LCB_Z: f64 = 1.96;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub graph_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Ad account id, digits only (META_AD_ACCOUNT_ID). Checked per request.
    pub ad_account_id: Option<String>,
    /// Graph API bearer token (META_ACCESS_TOKEN). Checked per request.
    pub access_token: Option<String>,
    /// Ordered action_type keys searched when extracting purchase counts/values
    /// (PURCHASE_ACTION_TYPES, comma-separated). First match wins.
    pub purchase_action_types: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            graph_api_url: std::env::var("GRAPH_API_URL")
                .unwrap_or_else(|_| GRAPH_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "metrics.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            ad_account_id: std::env::var("META_AD_ACCOUNT_ID")
                .ok()
                .map(|s| s.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
                .filter(|s| !s.is_empty()),
            access_token: std::env::var("META_ACCESS_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            purchase_action_types: std::env::var("PURCHASE_ACTION_TYPES")
                .unwrap_or_else(|_| {
                    "purchase,offsite_conversion.fb_pixel_purchase,omni_purchase".to_string()
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
