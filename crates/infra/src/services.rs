//! Service wiring.

use std::sync::Arc;

use anyhow::Context;

use copilot_core::{SharedClock, SystemClock};
use copilot_learning::{
    FeedbackLedger, GuidanceEngine, InMemoryLedgerPersistence, LearningConfig, LedgerPersistence,
};
use copilot_proposals::{InMemoryProposalStore, ProposalConfig};

use crate::config::CopilotConfig;
use crate::persistence::JsonFileLedgerPersistence;
use crate::workflow::ApprovalWorkflow;

/// Everything the outer layer needs, sharing one clock.
#[derive(Clone)]
pub struct CopilotServices {
    pub proposals: Arc<InMemoryProposalStore>,
    pub ledger: Arc<FeedbackLedger>,
    pub guidance: GuidanceEngine,
    pub workflow: ApprovalWorkflow<Arc<InMemoryProposalStore>>,
    pub clock: SharedClock,
}

impl std::fmt::Debug for CopilotServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopilotServices")
            .field("proposals", &self.proposals)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

pub fn build_services(config: &CopilotConfig) -> anyhow::Result<CopilotServices> {
    build_services_with_clock(config, SystemClock::shared())
}

pub fn build_services_with_clock(config: &CopilotConfig, clock: SharedClock) -> anyhow::Result<CopilotServices> {
    if !config.use_persistent_stores {
        tracing::info!("persistent stores disabled; learning ledger kept in memory");
        return Ok(build_in_memory_services(config.proposals, config.learning.clone(), clock));
    }

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory {}", config.data_dir.display()))?;
    tracing::info!(data_dir = %config.data_dir.display(), "using JSON file learning store");

    let persistence: Arc<dyn LedgerPersistence> = Arc::new(JsonFileLedgerPersistence::new(&config.data_dir));
    Ok(wire(config.proposals, config.learning.clone(), persistence, clock))
}

/// In-memory wiring (dev/test).
pub fn build_in_memory_services(
    proposal_config: ProposalConfig,
    learning_config: LearningConfig,
    clock: SharedClock,
) -> CopilotServices {
    wire(
        proposal_config,
        learning_config,
        Arc::new(InMemoryLedgerPersistence::new()),
        clock,
    )
}

fn wire(
    proposal_config: ProposalConfig,
    learning_config: LearningConfig,
    persistence: Arc<dyn LedgerPersistence>,
    clock: SharedClock,
) -> CopilotServices {
    let proposals = InMemoryProposalStore::arc(proposal_config, clock.clone());
    let ledger = Arc::new(FeedbackLedger::open(persistence, clock.clone(), learning_config));
    let guidance = GuidanceEngine::new(ledger.clone());
    let workflow = ApprovalWorkflow::new(proposals.clone(), ledger.clone());

    CopilotServices {
        proposals,
        ledger,
        guidance,
        workflow,
        clock,
    }
}
