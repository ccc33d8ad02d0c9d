//! Guidance for the next suggestion, derived from past outcomes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use copilot_core::{action_type, pattern_key, screen};

use crate::config::LearningConfig;
use crate::feedback::{FeedbackEntry, UserAction, common_screens, excerpt};
use crate::ledger::{FeedbackLedger, LedgerState};

/// How boldly the suggestion generator should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionApproach {
    Standard,
    Cautious,
}

/// A past outcome in a context resembling the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarContext {
    pub user_action: UserAction,
    pub score: f64,
    pub suggestion_excerpt: String,
    pub feedback_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Scoring/recommendation package handed to the suggestion generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub should_suggest: bool,
    pub confidence_score: f64,
    pub suggested_approach: SuggestionApproach,
    /// Most frequent rejection reasons for this pattern.
    pub avoid_patterns: Vec<String>,
    /// Most recently accepted suggestion texts for this pattern.
    pub preferred_patterns: Vec<String>,
    pub historical_success_rate: f64,
    pub similar_contexts: Vec<SimilarContext>,
}

impl Default for Guidance {
    fn default() -> Self {
        Self {
            should_suggest: true,
            confidence_score: 0.5,
            suggested_approach: SuggestionApproach::Standard,
            avoid_patterns: Vec::new(),
            preferred_patterns: Vec::new(),
            historical_success_rate: 0.0,
            similar_contexts: Vec::new(),
        }
    }
}

/// Read-only view over the ledger that produces [`Guidance`].
#[derive(Debug, Clone)]
pub struct GuidanceEngine {
    ledger: Arc<FeedbackLedger>,
}

impl GuidanceEngine {
    pub fn new(ledger: Arc<FeedbackLedger>) -> Self {
        Self { ledger }
    }

    pub fn guidance(&self, current_action: &JsonValue, business_context: &JsonValue) -> Guidance {
        let config = self.ledger.config();
        self.ledger
            .with_state(|state| compute(state, config, current_action, business_context))
    }
}

/// Guidance from one consistent ledger state.
pub fn compute(
    state: &LedgerState,
    config: &LearningConfig,
    current_action: &JsonValue,
    business_context: &JsonValue,
) -> Guidance {
    let mut guidance = Guidance::default();
    let key = pattern_key(current_action);

    if let Some(stats) = state.patterns.get(&key) {
        guidance.historical_success_rate = stats.success_rate;
        guidance.confidence_score = stats.success_rate.min(config.max_confidence);
        if stats.success_rate < config.cautious_threshold {
            guidance.should_suggest = false;
            guidance.suggested_approach = SuggestionApproach::Cautious;
        }
        guidance.avoid_patterns = stats
            .top_rejection_reasons(3)
            .into_iter()
            .map(|r| r.reason)
            .collect();
        guidance.preferred_patterns = stats.recent_accepted_texts(3);
    }

    guidance.similar_contexts = similar_contexts(state, config, current_action, business_context);
    guidance
}

// Weights in tenths so threshold comparisons stay exact.
const SCREEN_POINTS: u32 = 5;
const TYPE_POINTS: u32 = 3;
const CONTEXT_POINTS: u32 = 2;
const MIN_POINTS: u32 = 5;

fn similarity_points(
    entry: &FeedbackEntry,
    current_screen: &str,
    current_type: &str,
    business_context: &JsonValue,
    overlap_threshold: f64,
) -> u32 {
    let original = &entry.suggestion_context.original_action;
    let mut points = 0;

    if screen(original).unwrap_or_default().to_lowercase() == current_screen {
        points += SCREEN_POINTS;
    }
    if action_type(original).unwrap_or_default() == current_type {
        points += TYPE_POINTS;
    }
    if screens_overlap(
        business_context,
        &entry.suggestion_context.business_context,
        overlap_threshold,
    ) {
        points += CONTEXT_POINTS;
    }
    points
}

/// Jaccard overlap of the two contexts' common screens exceeds `threshold`.
fn screens_overlap(a: &JsonValue, b: &JsonValue, threshold: f64) -> bool {
    let a = common_screens(a);
    let b = common_screens(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f64 / union as f64 > threshold
}

/// Bounded scan of the newest entries for resembling contexts.
///
/// Highest score first; equal scores keep ledger order.
pub fn similar_contexts(
    state: &LedgerState,
    config: &LearningConfig,
    current_action: &JsonValue,
    business_context: &JsonValue,
) -> Vec<SimilarContext> {
    let current_screen = screen(current_action).unwrap_or_default().to_lowercase();
    let current_type = action_type(current_action).unwrap_or_default();

    let start = state.entries.len().saturating_sub(config.similarity_window);
    let mut scored: Vec<(u32, &FeedbackEntry)> = state.entries[start..]
        .iter()
        .map(|entry| {
            let points = similarity_points(
                entry,
                &current_screen,
                current_type,
                business_context,
                config.screen_overlap_threshold,
            );
            (points, entry)
        })
        .filter(|(points, _)| *points >= MIN_POINTS)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(config.similar_contexts_limit);

    scored
        .into_iter()
        .map(|(points, entry)| SimilarContext {
            user_action: entry.user_action,
            score: f64::from(points) / 10.0,
            suggestion_excerpt: excerpt(&entry.suggestion_context.suggestion_text, config.excerpt_chars),
            feedback_reason: entry.feedback_reason.clone(),
            timestamp: entry.timestamp,
        })
        .collect()
}
