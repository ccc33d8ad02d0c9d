//! `copilot-learning`
//!
//! **Responsibility:** learn from what users did with past suggestions.
//!
//! - [`FeedbackLedger`]: append-only, durably persisted record of outcomes
//!   (accepted / rejected / ignored), plus the per-pattern aggregate table it
//!   maintains incrementally.
//! - [`GuidanceEngine`]: read path that turns the aggregates and a bounded scan of
//!   recent entries into a [`Guidance`] package for the next suggestion.
//!
//! This crate never talks to the network and never generates text; persistence
//! goes through the [`LedgerPersistence`] seam.

pub mod config;
pub mod error;
pub mod feedback;
pub mod guidance;
pub mod ledger;
pub mod pattern;
pub mod persistence;
pub mod report;
pub mod statistics;

pub use config::LearningConfig;
pub use error::{LearningError, PersistenceError};
pub use feedback::{
    FeedbackEntry, FeedbackSubmission, PatternFeatures, SessionPattern, SuggestionContext, UserAction,
};
pub use guidance::{Guidance, GuidanceEngine, SimilarContext, SuggestionApproach};
pub use ledger::{FeedbackLedger, LedgerState};
pub use pattern::{PatternStats, PatternSummary, PatternTable, ReasonCount, SuggestionSummary};
pub use persistence::{InMemoryLedgerPersistence, LedgerPersistence, LedgerSnapshot};
pub use statistics::{
    LearningStatistics, LearningTrend, PatternPerformance, RecentPerformance, TrendDirection,
};
