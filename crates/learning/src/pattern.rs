//! Per-pattern aggregates maintained incrementally from the ledger.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use copilot_core::SuggestedAction;

use crate::feedback::{FeedbackEntry, UserAction, excerpt};

/// Pattern table keyed by pattern key. Ordered, so iteration is deterministic.
pub type PatternTable = BTreeMap<String, PatternStats>;

/// One bucket of the rejection-reason histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

/// Short record of a suggestion kept in the rolling lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSummary {
    pub suggestion_text: String,
    pub suggested_action: Option<SuggestedAction>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregated outcomes for one pattern key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub total_suggestions: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub ignored: u64,
    /// `accepted / total_suggestions`, recomputed on every update.
    pub success_rate: f64,
    /// Rejection reasons in first-seen order.
    pub rejection_reasons: Vec<ReasonCount>,
    /// Newest last.
    pub recent_accepted: VecDeque<SuggestionSummary>,
    /// Newest last.
    pub recent_rejected: VecDeque<SuggestionSummary>,
    pub last_updated: DateTime<Utc>,
}

impl PatternStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_suggestions: 0,
            accepted: 0,
            rejected: 0,
            ignored: 0,
            success_rate: 0.0,
            rejection_reasons: Vec::new(),
            recent_accepted: VecDeque::new(),
            recent_rejected: VecDeque::new(),
            last_updated: now,
        }
    }

    /// Fold one new entry into the aggregate.
    pub fn apply(&mut self, entry: &FeedbackEntry, list_cap: usize, summary_chars: usize) {
        self.total_suggestions += 1;
        match entry.user_action {
            UserAction::Accepted => self.accepted += 1,
            UserAction::Rejected => self.rejected += 1,
            UserAction::Ignored => self.ignored += 1,
        }
        self.success_rate = self.accepted as f64 / self.total_suggestions as f64;
        self.last_updated = entry.timestamp;

        if entry.user_action == UserAction::Rejected {
            if let Some(reason) = &entry.feedback_reason {
                self.count_rejection_reason(reason);
            }
        }

        let mut summary = SuggestionSummary {
            suggestion_text: excerpt(&entry.suggestion_context.suggestion_text, summary_chars),
            suggested_action: entry.suggestion_context.suggested_action.clone(),
            timestamp: entry.timestamp,
            reason: None,
        };

        match entry.user_action {
            UserAction::Accepted => push_bounded(&mut self.recent_accepted, summary, list_cap),
            UserAction::Rejected => {
                summary.reason = entry.feedback_reason.clone();
                push_bounded(&mut self.recent_rejected, summary, list_cap);
            }
            UserAction::Ignored => {}
        }
    }

    fn count_rejection_reason(&mut self, reason: &str) {
        match self.rejection_reasons.iter_mut().find(|r| r.reason == reason) {
            Some(bucket) => bucket.count += 1,
            None => self.rejection_reasons.push(ReasonCount {
                reason: reason.to_string(),
                count: 1,
            }),
        }
    }

    /// The `n` most frequent rejection reasons; ties keep first-seen order.
    pub fn top_rejection_reasons(&self, n: usize) -> Vec<ReasonCount> {
        let mut ranked = self.rejection_reasons.clone();
        // `sort_by` is stable.
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(n);
        ranked
    }

    /// Texts of the `n` most recently accepted suggestions, oldest first.
    pub fn recent_accepted_texts(&self, n: usize) -> Vec<String> {
        let skip = self.recent_accepted.len().saturating_sub(n);
        self.recent_accepted
            .iter()
            .skip(skip)
            .map(|s| s.suggestion_text.clone())
            .collect()
    }
}

fn push_bounded<T>(list: &mut VecDeque<T>, item: T, cap: usize) {
    list.push_back(item);
    while list.len() > cap {
        list.pop_front();
    }
}

/// Externally visible view of one pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    pub pattern_key: String,
    pub success_rate: f64,
    pub total_suggestions: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub ignored: u64,
    pub last_updated: DateTime<Utc>,
    pub top_rejection_reasons: Vec<ReasonCount>,
}

impl PatternSummary {
    pub fn from_stats(pattern_key: &str, stats: &PatternStats) -> Self {
        Self {
            pattern_key: pattern_key.to_string(),
            success_rate: stats.success_rate,
            total_suggestions: stats.total_suggestions,
            accepted: stats.accepted,
            rejected: stats.rejected,
            ignored: stats.ignored,
            last_updated: stats.last_updated,
            top_rejection_reasons: stats.top_rejection_reasons(3),
        }
    }
}
