use crate::config::priors;
use crate::types::AdMetrics;

/// Prior pseudo-counts for beta-binomial rate smoothing.
#[derive(Debug, Clone, Copy)]
pub struct BetaPriors {
    pub alpha_ctr: f64,
    pub beta_ctr: f64,
    pub alpha_cvr: f64,
    pub beta_cvr: f64,
}

impl Default for BetaPriors {
    fn default() -> Self {
        Self {
            alpha_ctr: priors::ALPHA_CTR,
            beta_ctr: priors::BETA_CTR,
            alpha_cvr: priors::ALPHA_CVR,
            beta_cvr: priors::BETA_CVR,
        }
    }
}

/// How raw counts become effective CTR/CVR estimates.
#[derive(Debug, Clone, Copy)]
pub enum RateSmoothing {
    /// Plain ratios, zero-guarded: clicks/impressions and purchases/clicks.
    Raw,
    /// Add-one smoothing on clicks plus a tiny purchase epsilon. Keeps CVR
    /// strictly positive and damps volatility near zero clicks.
    Additive,
    /// Posterior-mean rates under beta priors, optionally shrunk to a
    /// one-sided lower confidence bound (z > 0 enables shrinkage).
    BetaBinomial { priors: BetaPriors, lcb_z: Option<f64> },
}

/// Purchase-count epsilon for the additive variant.
const CVR_EPS: f64 = 1e-3;

impl RateSmoothing {
    /// Effective (ctr, cvr) as 0-1 fractions for the given counts.
    /// Never NaN for non-negative inputs.
    pub fn effective_rates(&self, m: &AdMetrics) -> (f64, f64) {
        match self {
            RateSmoothing::Raw => (
                safe_ratio(m.clicks, m.impressions),
                safe_ratio(m.purchases, m.clicks),
            ),
            RateSmoothing::Additive => (
                m.ctr_pct / 100.0,
                (m.purchases + CVR_EPS) / (m.clicks + 1.0),
            ),
            RateSmoothing::BetaBinomial { priors, lcb_z } => (
                beta_rate(m.clicks, m.impressions, priors.alpha_ctr, priors.beta_ctr, *lcb_z),
                beta_rate(m.purchases, m.clicks, priors.alpha_cvr, priors.beta_cvr, *lcb_z),
            ),
        }
    }
}

/// Posterior mean (successes+α)/(trials+α+β), optionally minus z standard
/// errors, floored at zero. Clamped to [0,1]: upstream rows can report
/// successes > trials on overlapping attribution windows.
pub fn beta_rate(successes: f64, trials: f64, alpha: f64, beta: f64, lcb_z: Option<f64>) -> f64 {
    let n = trials + alpha + beta;
    if n <= 0.0 {
        return 0.0;
    }
    let p = ((successes + alpha) / n).clamp(0.0, 1.0);
    match lcb_z {
        Some(z) => {
            let se = (p * (1.0 - p) / n).sqrt();
            (p - z * se).max(0.0)
        }
        None => p,
    }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(impressions: f64, clicks: f64, purchases: f64) -> AdMetrics {
        AdMetrics {
            ad_id: "1".to_string(),
            ad_name: String::new(),
            impressions,
            clicks,
            spend: 0.0,
            ctr_pct: if impressions > 0.0 { clicks / impressions * 100.0 } else { 0.0 },
            cpm: 0.0,
            purchases,
            purchase_value: 0.0,
            roas: 0.0,
        }
    }

    #[test]
    fn raw_rates_guard_zero_denominators() {
        let (ctr, cvr) = RateSmoothing::Raw.effective_rates(&metrics(0.0, 0.0, 0.0));
        assert_eq!(ctr, 0.0);
        assert_eq!(cvr, 0.0);
    }

    #[test]
    fn additive_cvr_strictly_positive_at_zero_clicks() {
        let (_, cvr) = RateSmoothing::Additive.effective_rates(&metrics(100.0, 0.0, 0.0));
        assert!(cvr > 0.0);
        assert!((cvr - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn beta_rate_bounded_for_any_counts() {
        for &(s, t) in &[(0.0, 0.0), (5.0, 10.0), (10.0, 10.0), (1e6, 1e6), (3.0, 0.0)] {
            let p = beta_rate(s, t, 2.0, 200.0, None);
            assert!((0.0..=1.0).contains(&p), "p={p} for s={s} t={t}");
        }
    }

    #[test]
    fn lcb_never_exceeds_posterior_mean() {
        for &(s, t) in &[(0.0, 0.0), (2.0, 50.0), (20.0, 1000.0), (500.0, 10000.0)] {
            let p = beta_rate(s, t, 2.0, 200.0, None);
            let lcb = beta_rate(s, t, 2.0, 200.0, Some(1.96));
            assert!(lcb <= p, "lcb={lcb} > p={p} for s={s} t={t}");
            assert!(lcb >= 0.0);
        }
    }

    #[test]
    fn beta_posterior_mean_matches_closed_form() {
        // (clicks + α) / (impressions + α + β) = (20 + 2) / (1000 + 202)
        let p = beta_rate(20.0, 1000.0, 2.0, 200.0, None);
        assert!((p - 22.0 / 1202.0).abs() < 1e-12);
    }

    #[test]
    fn more_samples_shrink_the_lcb_gap() {
        let gap_small = beta_rate(2.0, 100.0, 2.0, 200.0, None)
            - beta_rate(2.0, 100.0, 2.0, 200.0, Some(1.96));
        let gap_large = beta_rate(200.0, 10000.0, 2.0, 200.0, None)
            - beta_rate(200.0, 10000.0, 2.0, 200.0, Some(1.96));
        assert!(gap_large < gap_small);
    }
}
