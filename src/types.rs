use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reporting window
// ---------------------------------------------------------------------------

/// Inclusive calendar-day range over which the upstream API aggregates metrics.
/// `since <= until` holds by construction (derived from "N days ago" to today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl Window {
    /// Window ending today (UTC) and starting `days` days earlier.
    pub fn last_days(days: u32) -> Self {
        let until = Utc::now().date_naive();
        let since = until - Duration::days(i64::from(days));
        Self { since, until }
    }

    pub fn since_str(&self) -> String {
        self.since.format("%Y-%m-%d").to_string()
    }

    pub fn until_str(&self) -> String {
        self.until.format("%Y-%m-%d").to_string()
    }
}

// ---------------------------------------------------------------------------
// Upstream payload shapes
// ---------------------------------------------------------------------------

/// One entry of the loosely-typed `actions` / `action_values` arrays.
/// `value` arrives as a string ("5") or a bare number depending on API version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action_type: String,
    pub value: serde_json::Value,
}

/// The `purchase_roas` field is polymorphic: a plain number or an action list.
/// Normalized to a single f64 by the extractor; never carried past it.
#[derive(Debug, Clone)]
pub enum RoasField {
    Number(f64),
    Actions(Vec<ActionEntry>),
    Absent,
}

// ---------------------------------------------------------------------------
// Normalized / scored rows
// ---------------------------------------------------------------------------

/// Output of the extractor: one upstream row reduced to plain numbers.
/// All fields are zero when absent or malformed upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct AdMetrics {
    pub ad_id: String,
    pub ad_name: String,
    pub impressions: f64,
    pub clicks: f64,
    pub spend: f64,
    /// CTR in percentage form (0-100+), never negative.
    pub ctr_pct: f64,
    pub cpm: f64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub roas: f64,
}

/// One fully scored ad, as returned by the ranking endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRow {
    pub ad_id: String,
    pub ad_name: String,
    pub impressions: f64,
    pub clicks: f64,
    pub spend: f64,
    pub ctr_pct: f64,
    pub cpm: f64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub purchase_roas: f64,
    /// Smoothed conversion rate, strictly positive under additive smoothing.
    pub cvr: f64,
    /// Average order value; 0 when there are no purchases.
    pub aov: f64,
    /// Modeled profit per thousand impressions. May be negative.
    pub rpme_profit: f64,
    /// revenue - spend (profit/volume policy only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    /// Log-dampened spend emphasis (profit/volume policy only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_weight: Option<f64>,
    pub score: f64,
}
