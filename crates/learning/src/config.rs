//! Tuning constants for aggregation, guidance and statistics.

use chrono::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    /// Cap of the per-pattern recent accepted / rejected lists.
    pub rolling_list_cap: usize,
    /// Characters of suggestion text kept in a pattern summary.
    pub summary_text_chars: usize,
    /// How many of the newest ledger entries the similarity scan looks at.
    pub similarity_window: usize,
    /// How many similar contexts guidance returns.
    pub similar_contexts_limit: usize,
    /// Characters of suggestion text kept in a similar-context excerpt.
    pub excerpt_chars: usize,
    /// Jaccard overlap of common screens that counts as a similar business context.
    pub screen_overlap_threshold: f64,
    /// Success rate below which guidance advises against suggesting.
    pub cautious_threshold: f64,
    /// Upper bound of the confidence score.
    pub max_confidence: f64,
    /// Window of the "recent performance" statistic.
    pub recent_window: Duration,
    /// Minimum ledger size before a trend is reported.
    pub min_trend_entries: usize,
    /// Acceptance-rate delta that counts as improving / declining.
    pub trend_threshold: f64,
    /// Minimum suggestions before a pattern is ranked.
    pub min_pattern_support: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            rolling_list_cap: 10,
            summary_text_chars: 200,
            similarity_window: 50,
            similar_contexts_limit: 5,
            excerpt_chars: 100,
            screen_overlap_threshold: 0.3,
            cautious_threshold: 0.3,
            max_confidence: 0.9,
            recent_window: Duration::days(30),
            min_trend_entries: 10,
            trend_threshold: 0.1,
            min_pattern_support: 3,
        }
    }
}
