//! # minimal-store
//!
//! Persistence layer for the minimal agent engine.
//!
//! Everything lives in a single SQLite database opened in WAL mode. The
//! agent crate only ever talks to it through [`RunStore`] (request, step,
//! response and plan records) and [`MemoryStore`] (per-session exchange
//! history used as planning context).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  RunStore     requests / request_steps   │
//! │               responses / agent_plans    │
//! │  MemoryStore  agent_memory               │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL)                 │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use minimal_store::{Database, MemoryStore, RunStore};
//!
//! let db = Database::open_and_migrate("data/minimal.db").await?;
//! let runs = RunStore::new(db.clone());
//! let memory = MemoryStore::new(db);
//! ```

pub mod db;
pub mod error;
pub mod memory;
pub mod migration;
pub mod runs;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryEntry, MemoryStore, NewInteraction, PlanSummary};
pub use runs::{
    NewRequest, NewResponse, NewStep, RequestRecord, ResponseRecord, RunStore, StepRecord,
    StoredPlan,
};

/// Truncate `text` to at most `max_chars` characters without splitting a
/// UTF-8 code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
