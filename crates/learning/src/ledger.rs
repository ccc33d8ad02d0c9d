//! The feedback ledger and its pattern aggregates.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value as JsonValue;

use copilot_core::{FeedbackId, SharedClock};

use crate::config::LearningConfig;
use crate::error::LearningError;
use crate::feedback::{FeedbackEntry, FeedbackSubmission, SuggestionContext, UserAction};
use crate::pattern::{PatternStats, PatternSummary, PatternTable};
use crate::persistence::{LedgerPersistence, LedgerSnapshot};
use crate::report;
use crate::statistics::{self, LearningStatistics};

/// Committed ledger contents: ordered entries plus the aggregate table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    pub entries: Vec<FeedbackEntry>,
    pub patterns: PatternTable,
}

impl From<LedgerSnapshot> for LedgerState {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Self {
            entries: snapshot.entries,
            patterns: snapshot.patterns,
        }
    }
}

/// Append-only feedback store with incrementally maintained pattern statistics.
///
/// Each write (append + aggregate update + durable save) runs under one write
/// lock, so concurrent `record_feedback` calls never interleave their
/// read-modify-write of a `PatternStats`. Readers see the last committed state.
pub struct FeedbackLedger {
    state: RwLock<LedgerState>,
    persistence: Arc<dyn LedgerPersistence>,
    clock: SharedClock,
    config: LearningConfig,
}

impl std::fmt::Debug for FeedbackLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLedger")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeedbackLedger {
    /// Open the ledger, loading previously persisted state.
    ///
    /// State that cannot be loaded is logged and replaced by an empty ledger.
    pub fn open(
        persistence: Arc<dyn LedgerPersistence>,
        clock: SharedClock,
        config: LearningConfig,
    ) -> Self {
        let state = match persistence.load() {
            Ok(snapshot) => {
                tracing::info!(
                    entries = snapshot.entries.len(),
                    patterns = snapshot.patterns.len(),
                    "learning ledger loaded"
                );
                LedgerState::from(snapshot)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not load learning ledger; starting empty");
                LedgerState::default()
            }
        };

        Self {
            state: RwLock::new(state),
            persistence,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    // Mutations validate before touching the state and apply in one step, so a
    // poisoned lock still guards committed data.
    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against a consistent snapshot of the committed state.
    pub fn with_state<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        let state = self.read_state();
        f(&state)
    }

    fn persist(&self, state: &LedgerState, entry_id: Option<FeedbackId>) -> Result<(), LearningError> {
        self.persistence
            .save(&state.entries, &state.patterns)
            .map_err(|source| {
                tracing::error!(
                    error = %source,
                    feedback_id = ?entry_id,
                    "learning ledger write failed; in-memory state is ahead of disk"
                );
                LearningError::Persistence { entry_id, source }
            })
    }

    /// Append an outcome, update its pattern, and persist both artifacts.
    ///
    /// Returns only after the durable write. On `LearningError::Persistence` the
    /// entry is already in memory and is not rolled back.
    pub fn record_feedback(
        &self,
        context: SuggestionContext,
        user_action: UserAction,
        feedback_reason: Option<String>,
        execution_result: Option<JsonValue>,
    ) -> Result<FeedbackId, LearningError> {
        let mut state = self.write_state();
        let now = self.clock.now();

        let entry = FeedbackEntry::new(context, user_action, feedback_reason, execution_result, now);
        let id = entry.id;
        let pattern_key = entry.pattern_key.clone();

        state
            .patterns
            .entry(pattern_key.clone())
            .or_insert_with(|| PatternStats::new(now))
            .apply(&entry, self.config.rolling_list_cap, self.config.summary_text_chars);
        state.entries.push(entry);

        self.persist(&state, Some(id))?;

        tracing::info!(
            feedback_id = %id,
            pattern_key = %pattern_key,
            user_action = %user_action,
            "feedback recorded"
        );
        Ok(id)
    }

    /// Validate a raw submission and record it.
    pub fn record_submission(&self, submission: FeedbackSubmission) -> Result<FeedbackId, LearningError> {
        let user_action = submission.validate()?;
        tracing::debug!(
            action_id = submission.action_id.as_deref().unwrap_or_default(),
            "recording submitted feedback"
        );
        self.record_feedback(
            submission.suggestion_context,
            user_action,
            submission.feedback_reason,
            submission.execution_result,
        )
    }

    /// Clear the ledger and pattern table and persist the empty state.
    pub fn reset(&self) -> Result<(), LearningError> {
        let mut state = self.write_state();
        let dropped = state.entries.len();
        *state = LedgerState::default();
        self.persist(&state, None)?;
        tracing::warn!(dropped_entries = dropped, "learning ledger reset");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all entries, oldest first.
    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.read_state().entries.clone()
    }

    pub fn pattern(&self, pattern_key: &str) -> Option<PatternStats> {
        self.read_state().patterns.get(pattern_key).cloned()
    }

    /// Summaries of every learned pattern, ordered by pattern key.
    pub fn patterns(&self) -> Vec<PatternSummary> {
        self.read_state()
            .patterns
            .iter()
            .map(|(key, stats)| PatternSummary::from_stats(key, stats))
            .collect()
    }

    pub fn statistics(&self) -> LearningStatistics {
        let now = self.clock.now();
        self.with_state(|state| statistics::compute(state, &self.config, now))
    }

    /// Markdown description of what has been learned so far.
    pub fn learning_report(&self) -> String {
        self.with_state(report::render)
    }
}
