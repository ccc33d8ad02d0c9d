//! Proposal storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use copilot_core::{ProposalId, SharedClock, SuggestedAction, SystemClock};

use crate::error::ProposalError;
use crate::proposal::{ActionProposal, ProposalStatus};

/// Proposal lifetime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalConfig {
    /// How long a proposal stays confirmable.
    pub ttl: Duration,
    /// How long after expiry a proposal is kept before it is purged.
    pub retention: Duration,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(30),
            retention: Duration::hours(24),
        }
    }
}

/// Proposal counts by current status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub expired: usize,
    pub executed: usize,
}

impl StatusSummary {
    pub fn count(&self, status: ProposalStatus) -> usize {
        match status {
            ProposalStatus::Pending => self.pending,
            ProposalStatus::Confirmed => self.confirmed,
            ProposalStatus::Rejected => self.rejected,
            ProposalStatus::Expired => self.expired,
            ProposalStatus::Executed => self.executed,
        }
    }
}

/// Outcome of a hygiene sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pending proposals moved to Expired.
    pub expired: usize,
    /// Proposals purged after the retention window.
    pub removed: usize,
}

/// Proposal store abstraction.
///
/// Every mutating operation (including the lazy expiry performed by reads) is
/// serialized per store, so two racing `confirm` calls on one id resolve to
/// exactly one success.
pub trait ProposalStore: Send + Sync {
    /// Create a pending proposal. Always succeeds.
    fn propose(
        &self,
        session_id: &str,
        original_action: JsonValue,
        suggested_action: Option<SuggestedAction>,
        suggestion_text: &str,
    ) -> ProposalId;

    /// Fetch a proposal, applying lazy expiry first.
    fn get(&self, id: ProposalId) -> Result<ActionProposal, ProposalError>;

    /// Pending → Confirmed. Returns the confirmed proposal for execution.
    fn confirm(&self, id: ProposalId) -> Result<ActionProposal, ProposalError>;

    /// Pending → Rejected.
    fn reject(&self, id: ProposalId, reason: Option<String>) -> Result<ActionProposal, ProposalError>;

    /// Any status → Executed.
    fn mark_executed(
        &self,
        id: ProposalId,
        execution_result: JsonValue,
    ) -> Result<ActionProposal, ProposalError>;

    /// Pending, unexpired proposals of one session, oldest first.
    fn list_pending_for_session(&self, session_id: &str) -> Vec<ActionProposal>;

    /// Counts by status, after lazy expiry.
    fn status_summary(&self) -> StatusSummary;

    /// Expire stale pending proposals and purge those past retention.
    fn sweep(&self) -> SweepReport;
}

impl<S> ProposalStore for Arc<S>
where
    S: ProposalStore + ?Sized,
{
    fn propose(
        &self,
        session_id: &str,
        original_action: JsonValue,
        suggested_action: Option<SuggestedAction>,
        suggestion_text: &str,
    ) -> ProposalId {
        (**self).propose(session_id, original_action, suggested_action, suggestion_text)
    }

    fn get(&self, id: ProposalId) -> Result<ActionProposal, ProposalError> {
        (**self).get(id)
    }

    fn confirm(&self, id: ProposalId) -> Result<ActionProposal, ProposalError> {
        (**self).confirm(id)
    }

    fn reject(&self, id: ProposalId, reason: Option<String>) -> Result<ActionProposal, ProposalError> {
        (**self).reject(id, reason)
    }

    fn mark_executed(
        &self,
        id: ProposalId,
        execution_result: JsonValue,
    ) -> Result<ActionProposal, ProposalError> {
        (**self).mark_executed(id, execution_result)
    }

    fn list_pending_for_session(&self, session_id: &str) -> Vec<ActionProposal> {
        (**self).list_pending_for_session(session_id)
    }

    fn status_summary(&self) -> StatusSummary {
        (**self).status_summary()
    }

    fn sweep(&self) -> SweepReport {
        (**self).sweep()
    }
}

type ProposalMap = HashMap<ProposalId, ActionProposal>;

/// In-memory proposal store.
///
/// Proposals are short-lived (TTL plus retention) and are not persisted.
pub struct InMemoryProposalStore {
    proposals: RwLock<ProposalMap>,
    config: ProposalConfig,
    clock: SharedClock,
}

impl std::fmt::Debug for InMemoryProposalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProposalStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InMemoryProposalStore {
    pub fn new(config: ProposalConfig, clock: SharedClock) -> Self {
        Self {
            proposals: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn arc(config: ProposalConfig, clock: SharedClock) -> Arc<Self> {
        Arc::new(Self::new(config, clock))
    }

    pub fn config(&self) -> ProposalConfig {
        self.config
    }

    // The map is only ever modified in single steps after validation, so a
    // poisoned lock still guards consistent data.
    fn read_map(&self) -> RwLockReadGuard<'_, ProposalMap> {
        self.proposals.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, ProposalMap> {
        self.proposals.write().unwrap_or_else(|e| e.into_inner())
    }

    fn needs_sweep(&self, proposal: &ActionProposal, now: DateTime<Utc>) -> bool {
        proposal.is_due_to_expire(now) || proposal.is_past_retention(now, self.config.retention)
    }

    /// Lazy expiry + retention purge. Caller holds the write lock.
    ///
    /// Idempotent: running it twice at the same instant changes nothing the
    /// second time.
    fn sweep_locked(&self, map: &mut ProposalMap, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for proposal in map.values_mut() {
            if proposal.refresh_expiry(now) {
                tracing::debug!(proposal_id = %proposal.id(), "proposal expired");
                report.expired += 1;
            }
        }

        let retention = self.config.retention;
        let before = map.len();
        map.retain(|_, p| !p.is_past_retention(now, retention));
        report.removed = before - map.len();

        if report.removed > 0 {
            tracing::debug!(removed = report.removed, "purged proposals past retention");
        }
        report
    }

    /// Run `f` against the map with lazy expiry applied.
    ///
    /// Takes the read lock when nothing is stale and upgrades to the write lock
    /// (running a sweep) only when `stale` reports otherwise.
    fn with_fresh_map<R>(
        &self,
        stale: impl Fn(&ProposalMap, DateTime<Utc>) -> bool,
        f: impl FnOnce(&ProposalMap) -> R,
    ) -> R {
        let now = self.clock.now();
        {
            let map = self.read_map();
            if !stale(&map, now) {
                return f(&map);
            }
        }

        let mut map = self.write_map();
        let now = self.clock.now();
        self.sweep_locked(&mut map, now);
        f(&map)
    }

    fn mutate<R>(
        &self,
        id: ProposalId,
        f: impl FnOnce(&mut ActionProposal, DateTime<Utc>) -> Result<R, ProposalError>,
    ) -> Result<(R, ActionProposal), ProposalError> {
        let mut map = self.write_map();
        let now = self.clock.now();

        // Retention first; lazy expiry is left to the transition itself so that
        // confirm can report `Expired` for a proposal it finds stale.
        let retention = self.config.retention;
        map.retain(|_, p| !p.is_past_retention(now, retention));

        let proposal = map.get_mut(&id).ok_or(ProposalError::NotFound(id))?;
        let out = f(proposal, now)?;
        let snapshot = proposal.clone();

        self.sweep_locked(&mut map, now);
        Ok((out, snapshot))
    }
}

impl ProposalStore for InMemoryProposalStore {
    fn propose(
        &self,
        session_id: &str,
        original_action: JsonValue,
        suggested_action: Option<SuggestedAction>,
        suggestion_text: &str,
    ) -> ProposalId {
        let mut map = self.write_map();
        let now = self.clock.now();

        let proposal = ActionProposal::new(
            session_id,
            original_action,
            suggested_action,
            suggestion_text,
            now,
            self.config.ttl,
        );
        let id = proposal.id();
        map.insert(id, proposal);
        self.sweep_locked(&mut map, now);

        tracing::info!(proposal_id = %id, session_id, "proposal created");
        id
    }

    fn get(&self, id: ProposalId) -> Result<ActionProposal, ProposalError> {
        self.with_fresh_map(
            |map, now| map.get(&id).is_some_and(|p| self.needs_sweep(p, now)),
            |map| map.get(&id).cloned().ok_or(ProposalError::NotFound(id)),
        )
    }

    fn confirm(&self, id: ProposalId) -> Result<ActionProposal, ProposalError> {
        // An `Expired` failure must still commit the Pending → Expired
        // transition, so it cannot go through `mutate`'s early return.
        let mut map = self.write_map();
        let now = self.clock.now();
        let retention = self.config.retention;
        map.retain(|_, p| !p.is_past_retention(now, retention));

        let proposal = map.get_mut(&id).ok_or(ProposalError::NotFound(id))?;
        let outcome = proposal.confirm(now).map(|()| proposal.clone());
        self.sweep_locked(&mut map, now);

        match &outcome {
            Ok(_) => tracing::info!(proposal_id = %id, "proposal confirmed"),
            Err(err) => tracing::debug!(proposal_id = %id, error = %err, "confirm refused"),
        }
        outcome
    }

    fn reject(&self, id: ProposalId, reason: Option<String>) -> Result<ActionProposal, ProposalError> {
        let ((), proposal) = self.mutate(id, |p, now| {
            p.refresh_expiry(now);
            p.reject(reason, now)
        })?;
        tracing::info!(
            proposal_id = %id,
            reason = proposal.rejection_reason().unwrap_or_default(),
            "proposal rejected"
        );
        Ok(proposal)
    }

    fn mark_executed(
        &self,
        id: ProposalId,
        execution_result: JsonValue,
    ) -> Result<ActionProposal, ProposalError> {
        let (previous, proposal) =
            self.mutate(id, |p, now| Ok(p.mark_executed(execution_result, now)))?;

        if previous == ProposalStatus::Confirmed {
            tracing::info!(proposal_id = %id, "proposal executed");
        } else {
            tracing::warn!(
                proposal_id = %id,
                previous_status = %previous,
                "proposal executed without confirmation"
            );
        }
        Ok(proposal)
    }

    fn list_pending_for_session(&self, session_id: &str) -> Vec<ActionProposal> {
        self.with_fresh_map(
            |map, now| {
                map.values()
                    .any(|p| p.session_id() == session_id && self.needs_sweep(p, now))
            },
            |map| {
                let mut pending: Vec<_> = map
                    .values()
                    .filter(|p| p.session_id() == session_id && p.status() == ProposalStatus::Pending)
                    .cloned()
                    .collect();
                pending.sort_by_key(|p| (p.created_at(), p.id()));
                pending
            },
        )
    }

    fn status_summary(&self) -> StatusSummary {
        self.with_fresh_map(
            |map, now| map.values().any(|p| self.needs_sweep(p, now)),
            |map| {
                let mut summary = StatusSummary {
                    total: map.len(),
                    ..StatusSummary::default()
                };
                for proposal in map.values() {
                    match proposal.status() {
                        ProposalStatus::Pending => summary.pending += 1,
                        ProposalStatus::Confirmed => summary.confirmed += 1,
                        ProposalStatus::Rejected => summary.rejected += 1,
                        ProposalStatus::Expired => summary.expired += 1,
                        ProposalStatus::Executed => summary.executed += 1,
                    }
                }
                summary
            },
        )
    }

    fn sweep(&self) -> SweepReport {
        let mut map = self.write_map();
        let now = self.clock.now();
        self.sweep_locked(&mut map, now)
    }
}

impl Default for InMemoryProposalStore {
    fn default() -> Self {
        Self::new(ProposalConfig::default(), SystemClock::shared())
    }
}
