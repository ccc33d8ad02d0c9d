//! Infrastructure layer: configuration, durable storage, wiring.
//!
//! The domain crates stay free of IO; this crate supplies the JSON-file
//! ledger store, reads configuration from the environment, and wires proposal
//! store, ledger and guidance together behind [`CopilotServices`].

pub mod config;
pub mod persistence;
pub mod services;
pub mod workflow;

pub use config::CopilotConfig;
pub use persistence::JsonFileLedgerPersistence;
pub use services::{CopilotServices, build_in_memory_services, build_services, build_services_with_clock};
pub use workflow::{ApprovalWorkflow, WorkflowError};
