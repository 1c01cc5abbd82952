use serde_json::Value;

use crate::types::{ActionEntry, AdMetrics, RoasField};

/// Normalize one raw insights row into plain numbers.
///
/// Parsing is deliberately permissive: the upstream schema varies by API
/// version and breakdown, so any absent or malformed field degrades to 0
/// rather than failing the row. Pure function — same row in, same metrics out.
pub fn extract(row: &Value, purchase_priority: &[String]) -> AdMetrics {
    let impressions = num(row.get("impressions"));
    let clicks = num(row.get("clicks"));
    let spend = num(row.get("spend"));
    let cpm = num(row.get("cpm"));

    let ctr_pct = extract_ctr_pct(row.get("ctr"), impressions, clicks);

    let purchases = pick_action_value(row.get("actions"), purchase_priority).unwrap_or(0.0);
    let purchase_value =
        pick_action_value(row.get("action_values"), purchase_priority).unwrap_or(0.0);

    let roas = RoasField::from_value(row.get("purchase_roas")).normalize(purchase_priority);

    AdMetrics {
        ad_id: row
            .get("ad_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        ad_name: row
            .get("ad_name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        impressions,
        clicks,
        spend,
        ctr_pct,
        cpm,
        purchases,
        purchase_value,
        roas,
    }
}

/// CTR arrives as a bare number or a percentage string like "1.23%".
/// When it parses to 0 (or not at all) but impressions exist, recompute
/// from clicks/impressions — the API sometimes omits ctr on breakdown rows.
fn extract_ctr_pct(ctr: Option<&Value>, impressions: f64, clicks: f64) -> f64 {
    let parsed = match ctr {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed != 0.0 && parsed.is_finite() {
        parsed.max(0.0)
    } else if impressions > 0.0 {
        clicks / impressions * 100.0
    } else {
        0.0
    }
}

/// Ordered priority lookup over an action array: the first priority key that
/// matches any entry wins, regardless of array order. Absence yields None.
fn pick_action_value(actions: Option<&Value>, priority: &[String]) -> Option<f64> {
    let arr = actions?.as_array()?;
    for key in priority {
        if let Some(entry) = arr
            .iter()
            .find(|e| e.get("action_type").and_then(|t| t.as_str()) == Some(key.as_str()))
        {
            return Some(num(entry.get("value")));
        }
    }
    None
}

/// Coerce a JSON value to f64: numbers pass through, numeric strings parse,
/// everything else (null, absent, malformed) is 0.
pub fn num(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl RoasField {
    pub fn from_value(v: Option<&Value>) -> Self {
        match v {
            Some(Value::Number(n)) => RoasField::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::Array(items)) => RoasField::Actions(
                items
                    .iter()
                    .map(|e| ActionEntry {
                        action_type: e
                            .get("action_type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("")
                            .to_string(),
                        value: e.get("value").cloned().unwrap_or(Value::Null),
                    })
                    .collect(),
            ),
            _ => RoasField::Absent,
        }
    }

    /// Collapse the union to one number. Lists get the priority lookup; when
    /// no priority key matches, the first element is taken regardless of its
    /// action_type (preserves upstream behavior observed in production data).
    pub fn normalize(&self, priority: &[String]) -> f64 {
        match self {
            RoasField::Number(n) => *n,
            RoasField::Actions(entries) => {
                let picked = priority
                    .iter()
                    .find_map(|key| entries.iter().find(|e| e.action_type == *key))
                    .map(|e| num(Some(&e.value)))
                    .unwrap_or(0.0);
                if picked != 0.0 {
                    picked
                } else {
                    entries
                        .first()
                        .map(|e| num(Some(&e.value)))
                        .unwrap_or(0.0)
                }
            }
            RoasField::Absent => 0.0,
        }
    }
}
