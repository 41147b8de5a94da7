//! Session memory seam used by the runner.
//!
//! The runner only needs two things from memory: prior exchanges rendered
//! as planning context, and a place to put the finished exchange.
//! [`StoreMemory`] adapts the SQLite [`MemoryStore`] with the configured
//! window.

use async_trait::async_trait;
use minimal_store::{MemoryStore, NewInteraction};

use crate::error::Result;

/// Exchanges fetched for context by default.
pub const DEFAULT_CONTEXT_EXCHANGES: usize = 10;
/// Character ceiling for the rendered context by default.
pub const DEFAULT_CONTEXT_CHARS: usize = 3_000;

#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Rendered prior exchanges for `session_id`, or `""` when there are none.
    async fn session_context(&self, session_id: &str) -> Result<String>;

    async fn store_interaction(&self, interaction: NewInteraction) -> Result<()>;
}

/// [`SessionMemory`] over the `agent_memory` table.
#[derive(Clone)]
pub struct StoreMemory {
    store: MemoryStore,
    limit: usize,
    max_chars: usize,
}

impl StoreMemory {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            limit: DEFAULT_CONTEXT_EXCHANGES,
            max_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    pub fn with_window(mut self, limit: usize, max_chars: usize) -> Self {
        self.limit = limit;
        self.max_chars = max_chars;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl SessionMemory for StoreMemory {
    async fn session_context(&self, session_id: &str) -> Result<String> {
        Ok(self
            .store
            .session_context(session_id, self.limit, self.max_chars)
            .await?)
    }

    async fn store_interaction(&self, interaction: NewInteraction) -> Result<()> {
        self.store.store_interaction(interaction).await?;
        Ok(())
    }
}
