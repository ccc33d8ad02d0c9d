use copilot_core::ProposalId;
use thiserror::Error;

use crate::proposal::ProposalStatus;

/// Why a proposal operation did not apply.
///
/// In every case the store is left unchanged, except for `Expired`, which
/// records the Pending → Expired transition it discovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("proposal not found: {0}")]
    NotFound(ProposalId),

    #[error("proposal {id} already processed (status: {status})")]
    AlreadyProcessed { id: ProposalId, status: ProposalStatus },

    #[error("proposal expired: {0}")]
    Expired(ProposalId),
}
