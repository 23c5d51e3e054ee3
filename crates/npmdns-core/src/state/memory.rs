// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - The first cycle after a restart treats every domain as new (create-or-
//   update, which is idempotent on the provider side)
//
// ## When to Use
//
// - Tests
// - Dry runs, where nothing that was only pretended should be remembered

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateSnapshot, StateStore};

/// In-memory state store implementation
///
/// Clones share the same underlying snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<StateSnapshot>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `snapshot`
    pub fn with_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Current contents
    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<StateSnapshot, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), Error> {
        *self.inner.write().await = snapshot.clone();
        Ok(())
    }
}
