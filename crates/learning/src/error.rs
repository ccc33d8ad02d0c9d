use copilot_core::FeedbackId;
use thiserror::Error;

/// Failure of the durable store behind the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearningError {
    /// The request was malformed; nothing was recorded.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The in-memory ledger was updated but the durable write failed.
    ///
    /// `entry_id` is the id of the entry that is now in memory (`None` for a
    /// reset). Callers decide whether to treat it as committed.
    #[error("durable write failed, in-memory state already updated: {source}")]
    Persistence {
        entry_id: Option<FeedbackId>,
        #[source]
        source: PersistenceError,
    },
}

impl LearningError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the in-memory state reflects the operation despite the error.
    pub fn applied_in_memory(&self) -> bool {
        matches!(self, LearningError::Persistence { .. })
    }
}
