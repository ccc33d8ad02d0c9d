//! Approval workflow: proposal transitions that also feed the learning ledger.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use copilot_core::{FeedbackId, ProposalId};
use copilot_learning::{FeedbackLedger, LearningError, SuggestionContext, UserAction};
use copilot_proposals::{ActionProposal, ProposalError, ProposalStore};

pub const DEFAULT_REJECTION_REASON: &str = "User rejected";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Proposal(#[from] ProposalError),

    /// The proposal transition is committed; only the feedback entry failed.
    #[error("proposal {proposal_id} updated but feedback was not recorded: {source}")]
    Feedback {
        proposal_id: ProposalId,
        #[source]
        source: LearningError,
    },
}

/// Proposal snapshot as seen by the ledger.
pub fn suggestion_context(proposal: &ActionProposal) -> SuggestionContext {
    SuggestionContext {
        original_action: proposal.original_action().clone(),
        suggested_action: proposal.suggested_action().cloned(),
        suggestion_text: proposal.suggestion_text().to_string(),
        business_context: JsonValue::Null,
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow<S> {
    proposals: S,
    ledger: Arc<FeedbackLedger>,
}

impl<S: ProposalStore> ApprovalWorkflow<S> {
    pub fn new(proposals: S, ledger: Arc<FeedbackLedger>) -> Self {
        Self { proposals, ledger }
    }

    pub fn proposals(&self) -> &S {
        &self.proposals
    }

    /// Confirm a proposal and hand it back for execution.
    pub fn confirm(&self, id: ProposalId) -> Result<ActionProposal, WorkflowError> {
        Ok(self.proposals.confirm(id)?)
    }

    /// Reject a proposal and record the rejection as feedback.
    pub fn reject(&self, id: ProposalId, reason: Option<String>) -> Result<ActionProposal, WorkflowError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());

        let proposal = self.proposals.reject(id, Some(reason.clone()))?;
        self.record(&proposal, UserAction::Rejected, Some(reason), None)?;
        Ok(proposal)
    }

    /// Mark a proposal executed and record the acceptance with its result.
    pub fn complete_execution(
        &self,
        id: ProposalId,
        execution_result: JsonValue,
    ) -> Result<ActionProposal, WorkflowError> {
        let proposal = self.proposals.mark_executed(id, execution_result.clone())?;
        self.record(&proposal, UserAction::Accepted, None, Some(execution_result))?;
        Ok(proposal)
    }

    fn record(
        &self,
        proposal: &ActionProposal,
        user_action: UserAction,
        reason: Option<String>,
        execution_result: Option<JsonValue>,
    ) -> Result<FeedbackId, WorkflowError> {
        let proposal_id = proposal.id();
        self.ledger
            .record_feedback(suggestion_context(proposal), user_action, reason, execution_result)
            .map_err(|source| {
                tracing::error!(
                    proposal_id = %proposal_id,
                    error = %source,
                    "feedback for proposal not recorded"
                );
                WorkflowError::Feedback { proposal_id, source }
            })
    }
}
