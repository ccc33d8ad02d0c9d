//! Proposal entity and its transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use copilot_core::{ProposalId, SuggestedAction};

use crate::error::ProposalError;

/// Proposal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Waiting for the user to decide.
    Pending,
    /// Approved by the user; the caller executes it next.
    Confirmed,
    /// Declined by the user.
    Rejected,
    /// TTL elapsed before a decision was made.
    Expired,
    /// The suggested call was carried out.
    Executed,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 5] = [
        ProposalStatus::Pending,
        ProposalStatus::Confirmed,
        ProposalStatus::Rejected,
        ProposalStatus::Expired,
        ProposalStatus::Executed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Confirmed => "confirmed",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
            ProposalStatus::Executed => "executed",
        }
    }

    /// Dead ends of the normal flow (only a forced execution leaves them).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected | ProposalStatus::Expired | ProposalStatus::Executed
        )
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suggested action awaiting a user's accept/reject decision.
///
/// Fields are private so that `expires_at` cannot change after creation and
/// `status` can only move through the transition methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    id: ProposalId,
    session_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    original_action: JsonValue,
    suggested_action: Option<SuggestedAction>,
    suggestion_text: String,
    status: ProposalStatus,
    confirmed_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    executed_at: Option<DateTime<Utc>>,
    execution_result: Option<JsonValue>,
}

impl ActionProposal {
    /// Create a new pending proposal valid for `ttl` from `now`.
    pub fn new(
        session_id: impl Into<String>,
        original_action: JsonValue,
        suggested_action: Option<SuggestedAction>,
        suggestion_text: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: ProposalId::new(),
            session_id: session_id.into(),
            created_at: now,
            expires_at: now + ttl,
            original_action,
            suggested_action,
            suggestion_text: suggestion_text.into(),
            status: ProposalStatus::Pending,
            confirmed_at: None,
            rejected_at: None,
            rejection_reason: None,
            executed_at: None,
            execution_result: None,
        }
    }

    pub fn id(&self) -> ProposalId {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn original_action(&self) -> &JsonValue {
        &self.original_action
    }

    pub fn suggested_action(&self) -> Option<&SuggestedAction> {
        self.suggested_action.as_ref()
    }

    pub fn suggestion_text(&self) -> &str {
        &self.suggestion_text
    }

    pub fn status(&self) -> ProposalStatus {
        self.status
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub fn execution_result(&self) -> Option<&JsonValue> {
        self.execution_result.as_ref()
    }

    /// Pending and past its TTL, i.e. due for the lazy Pending → Expired transition.
    pub fn is_due_to_expire(&self, now: DateTime<Utc>) -> bool {
        self.status == ProposalStatus::Pending && now > self.expires_at
    }

    /// Past the retention window, regardless of status.
    pub fn is_past_retention(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.expires_at < now - retention
    }

    /// Apply the lazy expiry check. Returns `true` if the status changed.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due_to_expire(now) {
            self.status = ProposalStatus::Expired;
            true
        } else {
            false
        }
    }

    /// Pending → Confirmed, if still within the TTL.
    ///
    /// A Pending proposal found past its TTL is moved to Expired and the call
    /// fails with `Expired`; the transition sticks.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), ProposalError> {
        match self.status {
            ProposalStatus::Pending if now > self.expires_at => {
                self.status = ProposalStatus::Expired;
                Err(ProposalError::Expired(self.id))
            }
            ProposalStatus::Pending => {
                self.status = ProposalStatus::Confirmed;
                self.confirmed_at = Some(now);
                Ok(())
            }
            ProposalStatus::Expired => Err(ProposalError::Expired(self.id)),
            status => Err(ProposalError::AlreadyProcessed {
                id: self.id,
                status,
            }),
        }
    }

    /// Pending → Rejected.
    pub fn reject(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), ProposalError> {
        if self.status != ProposalStatus::Pending {
            return Err(ProposalError::AlreadyProcessed {
                id: self.id,
                status: self.status,
            });
        }
        self.status = ProposalStatus::Rejected;
        self.rejected_at = Some(now);
        self.rejection_reason = reason;
        Ok(())
    }

    /// Any status → Executed. Returns the status the proposal was in before.
    ///
    /// Execution is recorded even for proposals that were never confirmed
    /// (out-of-band execution); callers that need approval must check
    /// the returned status themselves.
    pub fn mark_executed(&mut self, execution_result: JsonValue, now: DateTime<Utc>) -> ProposalStatus {
        let previous = self.status;
        self.status = ProposalStatus::Executed;
        self.executed_at = Some(now);
        self.execution_result = Some(execution_result);
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_proposal(now: DateTime<Utc>) -> ActionProposal {
        ActionProposal::new(
            "s1",
            json!({"type": "open_screen", "payload": {"screen": "SalesOrder"}}),
            Some(SuggestedAction::new("PUT", "/SalesOrder")),
            "Add related items?",
            now,
            Duration::minutes(30),
        )
    }

    #[test]
    fn new_proposal_is_pending_with_fixed_ttl() {
        let now = Utc::now();
        let p = test_proposal(now);
        assert_eq!(p.status(), ProposalStatus::Pending);
        assert_eq!(p.expires_at(), now + Duration::minutes(30));
        assert_eq!(p.session_id(), "s1");
        assert!(p.confirmed_at().is_none() && p.rejected_at().is_none());
    }

    #[test]
    fn confirm_within_ttl() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        let at = now + Duration::minutes(30);
        p.confirm(at).unwrap();
        assert_eq!(p.status(), ProposalStatus::Confirmed);
        assert_eq!(p.confirmed_at(), Some(at));
    }

    #[test]
    fn confirm_after_ttl_expires_the_proposal() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        let err = p.confirm(now + Duration::minutes(31)).unwrap_err();
        assert_eq!(err, ProposalError::Expired(p.id()));
        assert_eq!(p.status(), ProposalStatus::Expired);
        assert!(p.confirmed_at().is_none());
    }

    #[test]
    fn confirm_after_reject_is_already_processed() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        p.reject(Some("wrong vendor".to_string()), now).unwrap();
        let err = p.confirm(now).unwrap_err();
        assert!(matches!(
            err,
            ProposalError::AlreadyProcessed { status: ProposalStatus::Rejected, .. }
        ));
        assert!(p.confirmed_at().is_none());
    }

    #[test]
    fn reject_twice_only_transitions_once() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        p.reject(Some("first".to_string()), now).unwrap();
        let later = now + Duration::minutes(1);
        assert!(p.reject(Some("second".to_string()), later).is_err());
        assert_eq!(p.rejected_at(), Some(now));
        assert_eq!(p.rejection_reason(), Some("first"));
    }

    #[test]
    fn execution_after_rejection_is_recorded() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        p.reject(None, now).unwrap();

        let previous = p.mark_executed(json!({"ok": true}), now);

        assert_eq!(previous, ProposalStatus::Rejected);
        assert_eq!(p.status(), ProposalStatus::Executed);
        assert!(p.rejected_at().is_some());
        assert!(p.confirmed_at().is_none());
        assert_eq!(p.execution_result(), Some(&json!({"ok": true})));
    }

    #[test]
    fn refresh_expiry_only_touches_stale_pending() {
        let now = Utc::now();
        let mut p = test_proposal(now);
        assert!(!p.refresh_expiry(now + Duration::minutes(30)));
        assert!(p.refresh_expiry(now + Duration::minutes(31)));
        assert_eq!(p.status(), ProposalStatus::Expired);
        assert!(!p.refresh_expiry(now + Duration::minutes(60)));
    }

    #[test]
    fn retention_is_measured_from_expiry() {
        let now = Utc::now();
        let p = test_proposal(now);
        let retention = Duration::hours(24);
        let boundary = p.expires_at() + retention;
        assert!(!p.is_past_retention(boundary, retention));
        assert!(p.is_past_retention(boundary + Duration::seconds(1), retention));
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&ProposalStatus::Executed).unwrap();
        assert_eq!(s, "\"executed\"");
        assert_eq!(ProposalStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn only_pending_and_confirmed_are_open() {
        let open: Vec<_> = ProposalStatus::ALL
            .iter()
            .filter(|s| !s.is_terminal())
            .copied()
            .collect();
        assert_eq!(open, vec![ProposalStatus::Pending, ProposalStatus::Confirmed]);

        let names: Vec<_> = ProposalStatus::ALL.iter().map(ProposalStatus::as_str).collect();
        assert_eq!(names, vec!["pending", "confirmed", "rejected", "expired", "executed"]);
    }
}
