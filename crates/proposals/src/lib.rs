//! Proposal approval state machine.
//!
//! A proposal is an ERP action the copilot suggested and that is waiting for the
//! user to confirm or reject it. Proposals are only valid for a fixed TTL; expiry
//! is evaluated lazily against the injected clock on every access, never by a
//! background timer.
//!
//! ```text
//! Pending ──confirm──▶ Confirmed
//!    │ ──reject───▶ Rejected
//!    └──(ttl)─────▶ Expired
//! any ──mark_executed──▶ Executed
//! ```

pub mod error;
pub mod proposal;
pub mod store;

pub use error::ProposalError;
pub use proposal::{ActionProposal, ProposalStatus};
pub use store::{InMemoryProposalStore, ProposalConfig, ProposalStore, StatusSummary, SweepReport};
