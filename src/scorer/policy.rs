use crate::scorer::smoothing::RateSmoothing;
use crate::types::{AdMetrics, ScoredRow};

/// Composite-score weights for the ROAS-efficiency policy.
const W_ROAS: f64 = 1000.0;
const W_PURCHASES: f64 = 50.0;
const W_VALUE: f64 = 0.1;

/// Composite-score weights for the profit/volume policy.
const PV_W_PURCHASES: f64 = 1000.0;
const PV_W_ROAS: f64 = 50.0;
const PV_W_CTR: f64 = 0.1;

/// Selectable ranking strategy. The two variants answer different business
/// questions: efficiency per impression vs. absolute profit at volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorePolicy {
    /// score = roas*1000 + rpme_profit + purchases*50 + purchase_value*0.1
    RoasEfficiency,
    /// score = profit*spend_weight + purchases*1000 + roas*50 + ctr_pct*0.1
    /// where spend_weight = max(1, log10(1+spend)). The log damping keeps a
    /// single high-ROAS, low-volume outlier from dominating the ranking.
    ProfitVolume,
}

impl ScorePolicy {
    /// Score one extracted row under this policy with the given smoothing.
    pub fn score(&self, m: &AdMetrics, smoothing: RateSmoothing) -> ScoredRow {
        let (ctr_eff, cvr) = smoothing.effective_rates(m);
        let aov = if m.purchases > 0.0 {
            m.purchase_value / m.purchases
        } else {
            0.0
        };
        // Profit per thousand impressions: expected purchases per impression
        // times order value, minus the cost of those impressions.
        let rpme_profit = 1000.0 * ctr_eff * cvr * aov - m.cpm;

        let (purchase_value, profit, spend_weight, score) = match self {
            ScorePolicy::RoasEfficiency => {
                let score = m.roas * W_ROAS
                    + rpme_profit
                    + m.purchases * W_PURCHASES
                    + m.purchase_value * W_VALUE;
                (m.purchase_value, None, None, score)
            }
            ScorePolicy::ProfitVolume => {
                // Revenue may be missing from action_values while roas and
                // spend are present; derive it before computing profit.
                let derived_value = if m.purchase_value > 0.0 {
                    m.purchase_value
                } else if m.spend > 0.0 && m.roas > 0.0 {
                    m.roas * m.spend
                } else {
                    0.0
                };
                let profit = derived_value - m.spend;
                let spend_weight = (1.0 + m.spend).log10().max(1.0);
                let score = profit * spend_weight
                    + m.purchases * PV_W_PURCHASES
                    + m.roas * PV_W_ROAS
                    + m.ctr_pct * PV_W_CTR;
                (derived_value, Some(profit), Some(spend_weight), score)
            }
        };

        ScoredRow {
            ad_id: m.ad_id.clone(),
            ad_name: m.ad_name.clone(),
            impressions: m.impressions,
            clicks: m.clicks,
            spend: m.spend,
            ctr_pct: m.ctr_pct,
            cpm: m.cpm,
            purchases: m.purchases,
            purchase_value,
            purchase_roas: m.roas,
            cvr,
            aov,
            rpme_profit,
            profit,
            spend_weight,
            score,
        }
    }
}
