//! Ledger-wide learning statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::LearningConfig;
use crate::feedback::{FeedbackEntry, UserAction};
use crate::ledger::LedgerState;
use crate::pattern::ReasonCount;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPerformance {
    pub window_days: i64,
    pub total: usize,
    pub accepted: usize,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternPerformance {
    pub pattern_key: String,
    pub success_rate: f64,
    pub total_suggestions: u64,
    pub accepted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Acceptance rate of the earlier half of the ledger vs. the later half (by count).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LearningTrend {
    InsufficientData {
        entries: usize,
        required: usize,
    },
    Measured {
        early_acceptance_rate: f64,
        recent_acceptance_rate: f64,
        improvement: f64,
        direction: TrendDirection,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStatistics {
    pub total_suggestions_tracked: usize,
    pub overall_acceptance_rate: f64,
    pub overall_rejection_rate: f64,
    pub ignored_rate: f64,
    pub recent_performance: RecentPerformance,
    pub top_rejection_reasons: Vec<ReasonCount>,
    pub most_successful_patterns: Vec<PatternPerformance>,
    pub learning_trend: LearningTrend,
}

fn count(entries: &[FeedbackEntry], action: UserAction) -> usize {
    entries.iter().filter(|e| e.user_action == action).count()
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

pub fn compute(state: &LedgerState, config: &LearningConfig, now: DateTime<Utc>) -> LearningStatistics {
    let entries = &state.entries;
    let total = entries.len();

    let cutoff = now - config.recent_window;
    let recent: Vec<&FeedbackEntry> = entries.iter().filter(|e| e.timestamp >= cutoff).collect();
    let recent_accepted = recent
        .iter()
        .filter(|e| e.user_action == UserAction::Accepted)
        .count();

    LearningStatistics {
        total_suggestions_tracked: total,
        overall_acceptance_rate: rate(count(entries, UserAction::Accepted), total),
        overall_rejection_rate: rate(count(entries, UserAction::Rejected), total),
        ignored_rate: rate(count(entries, UserAction::Ignored), total),
        recent_performance: RecentPerformance {
            window_days: config.recent_window.num_days(),
            total: recent.len(),
            accepted: recent_accepted,
            acceptance_rate: rate(recent_accepted, recent.len()),
        },
        top_rejection_reasons: top_rejection_reasons(entries, 5),
        most_successful_patterns: most_successful_patterns(state, config.min_pattern_support, 5),
        learning_trend: trend(entries, config),
    }
}

/// Most frequent rejection reasons across the whole ledger; ties keep first-seen order.
fn top_rejection_reasons(entries: &[FeedbackEntry], n: usize) -> Vec<ReasonCount> {
    let mut counts: Vec<ReasonCount> = Vec::new();
    for entry in entries.iter().filter(|e| e.user_action == UserAction::Rejected) {
        let Some(reason) = &entry.feedback_reason else {
            continue;
        };
        match counts.iter_mut().find(|c| &c.reason == reason) {
            Some(c) => c.count += 1,
            None => counts.push(ReasonCount {
                reason: reason.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

/// Best success rates among patterns with enough support; ties by pattern key.
fn most_successful_patterns(state: &LedgerState, min_support: u64, n: usize) -> Vec<PatternPerformance> {
    let mut ranked: Vec<PatternPerformance> = state
        .patterns
        .iter()
        .filter(|(_, stats)| stats.total_suggestions >= min_support)
        .map(|(key, stats)| PatternPerformance {
            pattern_key: key.clone(),
            success_rate: stats.success_rate,
            total_suggestions: stats.total_suggestions,
            accepted: stats.accepted,
        })
        .collect();
    ranked.sort_by(|a, b| b.success_rate.total_cmp(&a.success_rate));
    ranked.truncate(n);
    ranked
}

fn trend(entries: &[FeedbackEntry], config: &LearningConfig) -> LearningTrend {
    if entries.len() < config.min_trend_entries || entries.len() < 2 {
        return LearningTrend::InsufficientData {
            entries: entries.len(),
            required: config.min_trend_entries,
        };
    }

    let (early, recent) = entries.split_at(entries.len() / 2);
    let early_rate = rate(count(early, UserAction::Accepted), early.len());
    let recent_rate = rate(count(recent, UserAction::Accepted), recent.len());
    let improvement = recent_rate - early_rate;

    let direction = if improvement > config.trend_threshold {
        TrendDirection::Improving
    } else if improvement < -config.trend_threshold {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    LearningTrend::Measured {
        early_acceptance_rate: early_rate,
        recent_acceptance_rate: recent_rate,
        improvement,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::SuggestionContext;
    use crate::pattern::PatternStats;
    use chrono::Duration;
    use serde_json::json;

    fn entry_at(key_screen: &str, action: UserAction, reason: Option<&str>, at: DateTime<Utc>) -> FeedbackEntry {
        FeedbackEntry::new(
            SuggestionContext::new(json!({"type": "open_screen", "payload": {"screen": key_screen}}), "t"),
            action,
            reason.map(str::to_string),
            None,
            at,
        )
    }

    fn state_of(entries: Vec<FeedbackEntry>) -> LedgerState {
        let config = LearningConfig::default();
        let mut state = LedgerState::default();
        for e in entries {
            state
                .patterns
                .entry(e.pattern_key.clone())
                .or_insert_with(|| PatternStats::new(e.timestamp))
                .apply(&e, config.rolling_list_cap, config.summary_text_chars);
            state.entries.push(e);
        }
        state
    }

    #[test]
    fn empty_ledger_reports_zeroes() {
        let stats = compute(&LedgerState::default(), &LearningConfig::default(), Utc::now());
        assert_eq!(stats.total_suggestions_tracked, 0);
        assert_eq!(stats.overall_acceptance_rate, 0.0);
        assert_eq!(stats.recent_performance.total, 0);
        assert!(stats.top_rejection_reasons.is_empty());
        assert_eq!(
            stats.learning_trend,
            LearningTrend::InsufficientData { entries: 0, required: 10 }
        );
    }

    #[test]
    fn rates_and_recent_window() {
        let now = Utc::now();
        let old = now - Duration::days(45);
        let state = state_of(vec![
            entry_at("A", UserAction::Accepted, None, old),
            entry_at("A", UserAction::Rejected, Some("price"), old),
            entry_at("A", UserAction::Accepted, None, now),
            entry_at("A", UserAction::Ignored, None, now),
        ]);

        let stats = compute(&state, &LearningConfig::default(), now);

        assert_eq!(stats.total_suggestions_tracked, 4);
        assert_eq!(stats.overall_acceptance_rate, 0.5);
        assert_eq!(stats.overall_rejection_rate, 0.25);
        assert_eq!(stats.ignored_rate, 0.25);
        assert_eq!(stats.recent_performance.window_days, 30);
        assert_eq!(stats.recent_performance.total, 2);
        assert_eq!(stats.recent_performance.accepted, 1);
        assert_eq!(stats.recent_performance.acceptance_rate, 0.5);
    }

    #[test]
    fn top_reasons_are_ranked_with_stable_ties() {
        let now = Utc::now();
        let mut entries = Vec::new();
        for reason in ["b", "a", "a", "c", "b", "d", "e", "f"] {
            entries.push(entry_at("A", UserAction::Rejected, Some(reason), now));
        }
        entries.push(entry_at("A", UserAction::Accepted, Some("not a rejection"), now));

        let stats = compute(&state_of(entries), &LearningConfig::default(), now);
        let reasons: Vec<_> = stats
            .top_rejection_reasons
            .iter()
            .map(|r| (r.reason.as_str(), r.count))
            .collect();
        assert_eq!(reasons, vec![("b", 2), ("a", 2), ("c", 1), ("d", 1), ("e", 1)]);
    }

    #[test]
    fn successful_patterns_need_support() {
        let now = Utc::now();
        let mut entries = Vec::new();
        for action in [UserAction::Accepted, UserAction::Accepted, UserAction::Rejected] {
            entries.push(entry_at("Low", action, None, now));
        }
        for _ in 0..3 {
            entries.push(entry_at("High", UserAction::Accepted, None, now));
        }
        entries.push(entry_at("Thin", UserAction::Accepted, None, now));

        let stats = compute(&state_of(entries), &LearningConfig::default(), now);
        let keys: Vec<_> = stats
            .most_successful_patterns
            .iter()
            .map(|p| p.pattern_key.as_str())
            .collect();
        assert_eq!(keys, vec!["open_screen_High", "open_screen_Low"]);
    }

    #[test]
    fn trend_compares_halves_by_count() {
        let now = Utc::now();
        let mut entries = Vec::new();
        for i in 0..10 {
            let action = if i < 5 {
                if i == 0 { UserAction::Accepted } else { UserAction::Rejected }
            } else {
                UserAction::Accepted
            };
            entries.push(entry_at("A", action, None, now));
        }

        let stats = compute(&state_of(entries), &LearningConfig::default(), now);
        match stats.learning_trend {
            LearningTrend::Measured {
                early_acceptance_rate,
                recent_acceptance_rate,
                direction,
                ..
            } => {
                assert_eq!(early_acceptance_rate, 0.2);
                assert_eq!(recent_acceptance_rate, 1.0);
                assert_eq!(direction, TrendDirection::Improving);
            }
            other => panic!("expected measured trend, got {other:?}"),
        }
    }

    #[test]
    fn small_delta_is_stable() {
        let now = Utc::now();
        let entries = (0..10)
            .map(|i| {
                // One acceptance in each half.
                let action = if i == 0 || i == 5 { UserAction::Accepted } else { UserAction::Rejected };
                entry_at("A", action, None, now)
            })
            .collect();
        let stats = compute(&state_of(entries), &LearningConfig::default(), now);
        match stats.learning_trend {
            LearningTrend::Measured { improvement, direction, .. } => {
                assert_eq!(improvement, 0.0);
                assert_eq!(direction, TrendDirection::Stable);
            }
            other => panic!("expected measured trend, got {other:?}"),
        }
    }

    #[test]
    fn falling_acceptance_is_declining() {
        let now = Utc::now();
        let entries = (0..10)
            .map(|i| {
                let action = if i < 5 { UserAction::Accepted } else { UserAction::Rejected };
                entry_at("A", action, None, now)
            })
            .collect();
        let stats = compute(&state_of(entries), &LearningConfig::default(), now);
        match stats.learning_trend {
            LearningTrend::Measured {
                early_acceptance_rate,
                recent_acceptance_rate,
                improvement,
                direction,
            } => {
                assert_eq!(early_acceptance_rate, 1.0);
                assert_eq!(recent_acceptance_rate, 0.0);
                assert_eq!(improvement, -1.0);
                assert_eq!(direction, TrendDirection::Declining);
            }
            other => panic!("expected measured trend, got {other:?}"),
        }
    }
}
