use crate::types::ScoredRow;

/// Sort descending by score and truncate to `page_size`.
///
/// The sort is stable: ties keep the order the upstream API returned them in.
pub fn rank(mut rows: Vec<ScoredRow>, page_size: usize) -> Vec<ScoredRow> {
    rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    rows.truncate(page_size);
    rows
}

/// Clamp a caller-supplied page size into `[min, max]`, using `default`
/// when absent. Prevents unranged requests from exhausting quota or memory.
pub fn clamp_limit(requested: Option<usize>, default: usize, min: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(min, max)
}
