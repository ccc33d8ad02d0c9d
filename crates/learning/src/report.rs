//! Markdown rendering of what the ledger has learned.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use chrono::Timelike;

use crate::feedback::{FeedbackEntry, UserAction};
use crate::ledger::LedgerState;

/// Part of the day an entry falls in, taken from the UTC hour of its
/// timestamp. Server-local time is never consulted, so a 09:00 entry at
/// UTC+05:00 counts as evening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    fn of(entry: &FeedbackEntry) -> Self {
        match entry.timestamp.hour() {
            6..=11 => DayPeriod::Morning,
            12..=17 => DayPeriod::Afternoon,
            _ => DayPeriod::Evening,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Evening => "evening",
        }
    }
}

const BEST_TIME_RATE: f64 = 0.7;
const AVOID_TIME_RATE: f64 = 0.3;

#[derive(Default)]
struct OutcomeGroup<'a> {
    count: usize,
    reasons: Vec<&'a str>,
}

fn group_by_pattern(state: &LedgerState, action: UserAction) -> BTreeMap<&str, OutcomeGroup<'_>> {
    let mut groups: BTreeMap<&str, OutcomeGroup<'_>> = BTreeMap::new();
    for entry in state.entries.iter().filter(|e| e.user_action == action) {
        let group = groups.entry(entry.pattern_key.as_str()).or_default();
        group.count += 1;
        if let Some(reason) = entry.feedback_reason.as_deref() {
            if !group.reasons.contains(&reason) {
                group.reasons.push(reason);
            }
        }
    }
    groups
}

fn share(state: &LedgerState, pattern_key: &str, count: usize) -> f64 {
    match state.patterns.get(pattern_key) {
        Some(stats) if stats.total_suggestions > 0 => count as f64 / stats.total_suggestions as f64,
        _ => 0.0,
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Render the learned state as Markdown. Pure function of `state`.
pub fn render(state: &LedgerState) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(state, &mut out);
    out
}

fn write_report(state: &LedgerState, out: &mut String) -> fmt::Result {
    writeln!(out, "# ERP Copilot Learning Patterns")?;
    writeln!(out)?;
    writeln!(
        out,
        "Learned from {} feedback entries across {} patterns.",
        state.entries.len(),
        state.patterns.len()
    )?;

    writeln!(out)?;
    writeln!(out, "## Successful Patterns (User Accepted)")?;
    for (key, group) in group_by_pattern(state, UserAction::Accepted) {
        writeln!(out)?;
        writeln!(out, "### Pattern: {key}")?;
        writeln!(out, "- **Occurrences**: {}", group.count)?;
        writeln!(out, "- **Acceptance Share**: {}", percent(share(state, key, group.count)))?;
        writeln!(out, "- **Recommendation**: keep suggesting similar actions in this context")?;
    }

    writeln!(out)?;
    writeln!(out, "## Failed Patterns (User Rejected)")?;
    for (key, group) in group_by_pattern(state, UserAction::Rejected) {
        writeln!(out)?;
        writeln!(out, "### Pattern: {key}")?;
        writeln!(out, "- **Occurrences**: {}", group.count)?;
        writeln!(out, "- **Rejection Share**: {}", percent(share(state, key, group.count)))?;
        if !group.reasons.is_empty() {
            writeln!(out, "- **Common Reasons**: {}", group.reasons.join(", "))?;
        }
        writeln!(out, "- **Avoid**: similar suggestions in this context")?;
    }

    writeln!(out)?;
    writeln!(out, "## Time-of-Day Recommendations")?;
    write_time_of_day(state, out)
}

fn write_time_of_day(state: &LedgerState, out: &mut String) -> fmt::Result {
    let mut periods: BTreeMap<DayPeriod, (usize, usize)> = BTreeMap::new();
    for entry in &state.entries {
        let (total, accepted) = periods.entry(DayPeriod::of(entry)).or_default();
        *total += 1;
        if entry.user_action == UserAction::Accepted {
            *accepted += 1;
        }
    }

    for (period, (total, accepted)) in periods {
        let rate = accepted as f64 / total as f64;
        let name = period.as_str();
        if rate > BEST_TIME_RATE {
            writeln!(out)?;
            writeln!(out, "### Best time for suggestions: {name}")?;
            writeln!(out, "- Users accept {} of suggestions during the {name}", percent(rate))?;
            writeln!(out, "- Continue proactive suggestions during the {name}")?;
        } else if rate < AVOID_TIME_RATE {
            writeln!(out)?;
            writeln!(out, "### Avoid suggestions during: {name}")?;
            writeln!(out, "- Users only accept {} of suggestions during the {name}", percent(rate))?;
            writeln!(out, "- Be more conservative with suggestions during the {name}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::feedback::SuggestionContext;
    use crate::pattern::PatternStats;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        format!("2026-03-02T{hour:02}:30:00Z").parse().unwrap()
    }

    fn state_of(records: &[(&str, UserAction, Option<&str>, u32)]) -> LedgerState {
        let config = LearningConfig::default();
        let mut state = LedgerState::default();
        for (screen, action, reason, hour) in records {
            let entry = FeedbackEntry::new(
                SuggestionContext::new(json!({"type": "open_screen", "payload": {"screen": screen}}), "t"),
                *action,
                reason.map(str::to_string),
                None,
                at(*hour),
            );
            state
                .patterns
                .entry(entry.pattern_key.clone())
                .or_insert_with(|| PatternStats::new(entry.timestamp))
                .apply(&entry, config.rolling_list_cap, config.summary_text_chars);
            state.entries.push(entry);
        }
        state
    }

    #[test]
    fn empty_state_renders_headings_only() {
        let report = render(&LedgerState::default());
        assert!(report.starts_with("# ERP Copilot Learning Patterns"));
        assert!(report.contains("## Successful Patterns (User Accepted)"));
        assert!(report.contains("## Failed Patterns (User Rejected)"));
        assert!(!report.contains("### "));
    }

    #[test]
    fn patterns_show_shares_and_deduplicated_reasons() {
        let state = state_of(&[
            ("SalesOrder", UserAction::Rejected, Some("wrong vendor"), 9),
            ("SalesOrder", UserAction::Rejected, Some("wrong vendor"), 9),
            ("SalesOrder", UserAction::Rejected, Some("too early"), 9),
            ("SalesOrder", UserAction::Accepted, None, 9),
        ]);

        let report = render(&state);

        assert!(report.contains("### Pattern: open_screen_SalesOrder\n- **Occurrences**: 1\n- **Acceptance Share**: 25.0%"));
        assert!(report.contains("- **Rejection Share**: 75.0%"));
        assert!(report.contains("- **Common Reasons**: wrong vendor, too early\n"));
    }

    #[test]
    fn time_of_day_buckets_drive_recommendations() {
        let state = state_of(&[
            ("A", UserAction::Accepted, None, 6),
            ("A", UserAction::Accepted, None, 11),
            ("A", UserAction::Rejected, None, 12),
            ("A", UserAction::Ignored, None, 17),
            ("A", UserAction::Accepted, None, 18),
            ("A", UserAction::Rejected, None, 3),
        ]);

        let report = render(&state);

        assert!(report.contains("### Best time for suggestions: morning"));
        assert!(report.contains("Users accept 100.0% of suggestions during the morning"));
        assert!(report.contains("### Avoid suggestions during: afternoon"));
        // evening is 1 of 2, neither best nor avoid
        assert!(!report.contains("evening"));
    }

    #[test]
    fn day_period_uses_utc_hour() {
        let local_morning: DateTime<Utc> = "2026-03-02T09:30:00+05:00".parse().unwrap();
        let entry = FeedbackEntry::new(
            SuggestionContext::new(json!({"type": "open_screen", "payload": {"screen": "A"}}), "t"),
            UserAction::Accepted,
            None,
            None,
            local_morning,
        );

        assert_eq!(entry.timestamp.hour(), 4);
        assert_eq!(DayPeriod::of(&entry), DayPeriod::Evening);
    }
}
