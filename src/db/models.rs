/// Database row types matching the migrations/ schema.
/// Used by sqlx for typed reads.

#[derive(Debug, sqlx::FromRow)]
pub struct PersistedMetric {
    pub id: i64,
    /// Discriminator for future scopes; always "ad" today.
    pub scope: String,
    pub ref_id: String,
    pub window_since: String,
    pub window_until: String,
    pub impressions: i64,
    pub clicks: i64,
    pub purchases: i64,
    pub spend: f64,
    pub revenue: f64,
    /// 0-1 fraction, not a percentage.
    pub ctr: f64,
    pub roas: Option<f64>,
    pub created_at: i64,
}
