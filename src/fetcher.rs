use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, UPSTREAM_RETRY_BACKOFF_MS, UPSTREAM_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::Window;

/// Ad-level fields requested on every insights read.
pub const INSIGHT_FIELDS: &str =
    "ad_id,ad_name,impressions,clicks,spend,ctr,cpm,actions,action_values,purchase_roas";

#[derive(Debug, Clone)]
pub struct InsightsQuery {
    pub window: Window,
    /// Total rows to collect across pages. Already clamped by the caller.
    pub limit: usize,
    pub breakdowns: Option<String>,
}

pub fn build_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .build()?)
}

/// Fetch one window of ad-level insight rows from the Graph API, following
/// `paging.cursors.after` until the limit is reached or pages run out.
/// Rows come back as raw JSON values; the extractor normalizes them.
pub async fn fetch_insights(
    client: &reqwest::Client,
    cfg: &Config,
    account_id: &str,
    token: &str,
    query: &InsightsQuery,
) -> Result<Vec<Value>> {
    let url = format!("{}/act_{}/insights", cfg.graph_api_url, account_id);
    let time_range = format!(
        r#"{{"since":"{}","until":"{}"}}"#,
        query.window.since_str(),
        query.window.until_str()
    );

    let mut rows: Vec<Value> = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let mut params: Vec<(&str, String)> = vec![
            ("level", "ad".to_string()),
            ("fields", INSIGHT_FIELDS.to_string()),
            ("limit", query.limit.to_string()),
            ("time_range", time_range.clone()),
            ("action_attribution_windows", "7d_click,1d_view".to_string()),
            ("action_report_time", "conversion".to_string()),
        ];
        if let Some(ref b) = query.breakdowns {
            params.push(("breakdowns", b.clone()));
        }
        if let Some(ref cursor) = after {
            params.push(("after", cursor.clone()));
        }

        let page = get_page(client, &url, &params, token).await?;
        let (mut page_rows, next) = parse_page(&page);
        debug!("Insights page: {} rows, next_cursor={}", page_rows.len(), next.is_some());

        let page_was_empty = page_rows.is_empty();
        rows.append(&mut page_rows);

        if rows.len() >= query.limit || next.is_none() || page_was_empty {
            break;
        }
        after = next;
    }

    rows.truncate(query.limit);
    info!(
        "Fetched {} insight rows for {} → {}",
        rows.len(),
        query.window.since_str(),
        query.window.until_str()
    );
    Ok(rows)
}

/// Issue one GET with bearer auth. A transient 429/5xx gets a single retry
/// after a short backoff; anything else non-2xx surfaces as Upstream with
/// the status and body embedded.
async fn get_page(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
    token: &str,
) -> Result<Value> {
    let mut attempt = 0u8;
    loop {
        let resp = client
            .get(url)
            .query(params)
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let transient = status.as_u16() == 429 || status.is_server_error();
        if transient && attempt == 0 {
            attempt += 1;
            warn!("Upstream {status} on insights read, retrying once");
            tokio::time::sleep(Duration::from_millis(UPSTREAM_RETRY_BACKOFF_MS)).await;
            continue;
        }

        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
}

/// Split an insights response into its data rows and the next-page cursor.
pub fn parse_page(resp: &Value) -> (Vec<Value>, Option<String>) {
    let rows = resp
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();
    let after = resp
        .get("paging")
        .and_then(|p| p.get("cursors"))
        .and_then(|c| c.get("after"))
        .and_then(|a| a.as_str())
        .map(|s| s.to_string());
    (rows, after)
}
