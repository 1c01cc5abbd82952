use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::{
    priors, Config, DAYS_MAX, DAYS_MIN, FETCH_LIMIT_DEFAULT, FETCH_LIMIT_MAX, FETCH_LIMIT_MIN,
    INGEST_FETCH_LIMIT_DEFAULT, INGEST_PAGE_SIZE, LISTING_FETCH_LIMIT_DEFAULT, RANKED_PAGE_SIZE,
};
use crate::db::MetricsWriter;
use crate::error::{AppError, Result};
use crate::extractor::extract;
use crate::fetcher::{fetch_insights, InsightsQuery};
use crate::ranker::{clamp_limit, rank};
use crate::scorer::{BetaPriors, RateSmoothing, ScorePolicy};
use crate::types::{ScoredRow, Window};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub cfg: Arc<Config>,
    pub client: reqwest::Client,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/insights", get(get_raw_listing))
        .route("/insights/ranked", get(get_ranked))
        .route("/insights/top-creatives", get(get_top_creatives))
        .route("/insights/ingest", get(get_ingest))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RankedQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
    /// 1 (default) = beta-binomial smoothing, 0 = raw ratios.
    pub smoothing: Option<u8>,
    /// 1 = shrink rates to a one-sided lower confidence bound.
    pub lcb: Option<u8>,
    pub alpha_ctr: Option<f64>,
    pub beta_ctr: Option<f64>,
    pub alpha_cvr: Option<f64>,
    pub beta_cvr: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Deserialize)]
pub struct RawListingQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
    /// Defaults to publisher_platform.
    pub breakdowns: Option<String>,
}

#[derive(Deserialize)]
pub struct TopCreativesQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct IngestQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
    /// "1" or "true" enables persistence of the scored rows.
    pub persist: Option<String>,
    pub breakdowns: Option<String>,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RawListingResponse {
    pub since: String,
    pub until: String,
    pub count: usize,
    pub data: Vec<serde_json::Value>,
}

#[derive(Serialize)]
pub struct RankedResponse {
    pub since: String,
    pub until: String,
    pub count: usize,
    pub ranked: Vec<ScoredRow>,
}

#[derive(Serialize)]
pub struct TopCreativesResponse {
    pub since: String,
    pub until: String,
    pub count: usize,
    pub top: Vec<ScoredRow>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub since: String,
    pub until: String,
    pub count: usize,
    pub items: Vec<ScoredRow>,
    pub persist: bool,
    pub persisted: usize,
    /// "ok" | "skipped" | "error" — a write failure never fails the read.
    pub db: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Raw per-platform listing: fetched rows pass through unscored.
async fn get_raw_listing(
    State(state): State<ApiState>,
    Query(params): Query<RawListingQuery>,
) -> Result<Json<RawListingResponse>> {
    let window = Window::last_days(clamp_days(params.days, 21));
    let limit = clamp_limit(
        params.limit,
        LISTING_FETCH_LIMIT_DEFAULT,
        FETCH_LIMIT_MIN,
        FETCH_LIMIT_MAX,
    );
    let breakdowns = params
        .breakdowns
        .unwrap_or_else(|| "publisher_platform".to_string());

    let rows = fetch_window(&state, window, limit, Some(breakdowns)).await?;

    Ok(Json(RawListingResponse {
        since: window.since_str(),
        until: window.until_str(),
        count: rows.len(),
        data: rows,
    }))
}

async fn get_ranked(
    State(state): State<ApiState>,
    Query(params): Query<RankedQuery>,
) -> Result<Json<RankedResponse>> {
    let window = Window::last_days(clamp_days(params.days, 21));
    let limit = clamp_limit(params.limit, FETCH_LIMIT_DEFAULT, FETCH_LIMIT_MIN, FETCH_LIMIT_MAX);

    let smoothing = if params.smoothing.unwrap_or(1) == 0 {
        RateSmoothing::Raw
    } else {
        RateSmoothing::BetaBinomial {
            priors: BetaPriors {
                alpha_ctr: params.alpha_ctr.unwrap_or(priors::ALPHA_CTR),
                beta_ctr: params.beta_ctr.unwrap_or(priors::BETA_CTR),
                alpha_cvr: params.alpha_cvr.unwrap_or(priors::ALPHA_CVR),
                beta_cvr: params.beta_cvr.unwrap_or(priors::BETA_CVR),
            },
            lcb_z: (params.lcb.unwrap_or(0) == 1).then(|| params.z.unwrap_or(priors::LCB_Z)),
        }
    };

    let rows = fetch_window(&state, window, limit, None).await?;
    let scored = score_rows(&state, &rows, smoothing, ScorePolicy::RoasEfficiency);
    let ranked = rank(scored, RANKED_PAGE_SIZE);

    Ok(Json(RankedResponse {
        since: window.since_str(),
        until: window.until_str(),
        count: rows.len(),
        ranked,
    }))
}

async fn get_top_creatives(
    State(state): State<ApiState>,
    Query(params): Query<TopCreativesQuery>,
) -> Result<Json<TopCreativesResponse>> {
    let window = Window::last_days(clamp_days(params.days, 7));
    let limit = clamp_limit(params.limit, FETCH_LIMIT_DEFAULT, FETCH_LIMIT_MIN, FETCH_LIMIT_MAX);

    let rows = fetch_window(&state, window, limit, None).await?;
    let scored = score_rows(&state, &rows, RateSmoothing::Raw, ScorePolicy::ProfitVolume);
    let top = rank(scored, RANKED_PAGE_SIZE);

    Ok(Json(TopCreativesResponse {
        since: window.since_str(),
        until: window.until_str(),
        count: rows.len(),
        top,
    }))
}

async fn get_ingest(
    State(state): State<ApiState>,
    Query(params): Query<IngestQuery>,
) -> Result<Json<IngestResponse>> {
    let window = Window::last_days(clamp_days(params.days, 21));
    let limit = clamp_limit(params.limit, INGEST_FETCH_LIMIT_DEFAULT, FETCH_LIMIT_MIN, FETCH_LIMIT_MAX);
    let persist = matches!(params.persist.as_deref(), Some("1") | Some("true"));

    let rows = fetch_window(&state, window, limit, params.breakdowns.clone()).await?;
    let scored = score_rows(&state, &rows, RateSmoothing::Additive, ScorePolicy::RoasEfficiency);
    let total = scored.len();
    // Sort everything before persisting; the response page is cut afterwards.
    let mut normalized = rank(scored, total);

    let (persisted, db) = if persist {
        let writer = MetricsWriter::new(state.pool.clone());
        let outcome = writer.persist(&normalized, window).await;
        match outcome.error {
            None => (outcome.persisted, "ok"),
            Some(_) => (outcome.persisted, "error"),
        }
    } else {
        (0, "skipped")
    };

    normalized.truncate(INGEST_PAGE_SIZE);

    Ok(Json(IngestResponse {
        since: window.since_str(),
        until: window.until_str(),
        count: rows.len(),
        items: normalized,
        persist,
        persisted,
        db,
    }))
}

async fn get_health(State(state): State<ApiState>) -> Result<Json<serde_json::Value>> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// ---------------------------------------------------------------------------
// Shared handler plumbing
// ---------------------------------------------------------------------------

async fn fetch_window(
    state: &ApiState,
    window: Window,
    limit: usize,
    breakdowns: Option<String>,
) -> Result<Vec<serde_json::Value>> {
    let account_id = state
        .cfg
        .ad_account_id
        .as_deref()
        .ok_or_else(|| AppError::Config("META_AD_ACCOUNT_ID missing".to_string()))?;
    let token = state.cfg.access_token.as_deref().ok_or(AppError::MissingToken)?;

    let query = InsightsQuery {
        window,
        limit,
        breakdowns,
    };
    fetch_insights(&state.client, &state.cfg, account_id, token, &query).await
}

fn score_rows(
    state: &ApiState,
    rows: &[serde_json::Value],
    smoothing: RateSmoothing,
    policy: ScorePolicy,
) -> Vec<ScoredRow> {
    rows.iter()
        .map(|r| policy.score(&extract(r, &state.cfg.purchase_action_types), smoothing))
        .collect()
}

fn clamp_days(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(DAYS_MIN, DAYS_MAX)
}
