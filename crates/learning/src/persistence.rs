//! Durable storage seam for the ledger.
//!
//! Both artifacts (the ordered ledger and the pattern table) are rewritten in
//! full on every successful mutation; there is no delta format.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::feedback::FeedbackEntry;
use crate::pattern::PatternTable;

/// Everything the ledger persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub entries: Vec<FeedbackEntry>,
    pub patterns: PatternTable,
}

/// Durable store abstraction.
///
/// `save` must not return until the write is durable: the ledger reports
/// success to its caller only after `save` returns `Ok`.
pub trait LedgerPersistence: Send + Sync {
    /// Load the last saved state. Absent state loads as empty.
    fn load(&self) -> Result<LedgerSnapshot, PersistenceError>;

    /// Replace the stored state with `entries` and `patterns`.
    fn save(&self, entries: &[FeedbackEntry], patterns: &PatternTable) -> Result<(), PersistenceError>;
}

/// Non-durable persistence for tests/dev.
///
/// Can be switched into a failing mode to exercise the persistence-error path.
#[derive(Debug, Default)]
pub struct InMemoryLedgerPersistence {
    saved: RwLock<LedgerSnapshot>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryLedgerPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved state.
    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            saved: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.saved.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LedgerPersistence for InMemoryLedgerPersistence {
    fn load(&self) -> Result<LedgerSnapshot, PersistenceError> {
        Ok(self.snapshot())
    }

    fn save(&self, entries: &[FeedbackEntry], patterns: &PatternTable) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io("simulated write failure".to_string()));
        }
        let mut saved = self.saved.write().unwrap_or_else(|e| e.into_inner());
        *saved = LedgerSnapshot {
            entries: entries.to_vec(),
            patterns: patterns.clone(),
        };
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
