//! `copilot-core` — shared building blocks for the copilot approval and learning core.
//!
//! This crate contains **pure** primitives (no IO): identifiers, the clock seam,
//! helpers for reading opaque ERP action descriptions, and the shared error type.

pub mod action;
pub mod clock;
pub mod error;
pub mod id;

pub use action::{SuggestedAction, action_type, pattern_key, screen};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use id::{FeedbackId, ProposalId};
