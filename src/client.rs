use std::sync::Arc;

use serde_json::Value;

use crate::backend::{Backend, MemoryBackend, RestBackend};
use crate::config::BackendConfig;
use crate::core::errors::Result;
use crate::core::query_params::Query;
use crate::session::SessionStore;
use crate::storage::{MemoryStorage, SessionStorage};

/// Handle passed to every operation: the backend plus the session whose
/// access token authorises table calls. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    sessions: Arc<SessionStore>,
}

impl Client {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn SessionStorage>) -> Self {
        let sessions = Arc::new(SessionStore::new(backend.clone(), storage));
        Self { backend, sessions }
    }

    pub fn from_parts(backend: Arc<dyn Backend>, sessions: Arc<SessionStore>) -> Self {
        Self { backend, sessions }
    }

    pub fn rest(config: BackendConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        Ok(Self::new(Arc::new(RestBackend::new(config)?), storage))
    }

    /// Client over a fresh in-memory backend and session slot.
    pub fn in_memory() -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let client = Self::new(backend.clone(), Arc::new(MemoryStorage::new()));
        (client, backend)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    async fn token(&self) -> Result<Option<String>> {
        self.sessions.access_token().await
    }

    pub async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let token = self.token().await?;
        self.backend.select(table, query, token.as_deref()).await
    }

    pub async fn select_single(&self, table: &str, query: &Query) -> Result<Value> {
        let token = self.token().await?;
        self.backend.select_single(table, query, token.as_deref()).await
    }

    pub async fn insert(&self, table: &str, row: Value) -> Result<Vec<Value>> {
        let token = self.token().await?;
        self.backend.insert(table, vec![row], token.as_deref()).await
    }

    pub async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let token = self.token().await?;
        self.backend.update(table, query, patch, token.as_deref()).await
    }

    pub async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let token = self.token().await?;
        self.backend.delete(table, query, token.as_deref()).await
    }

    pub async fn count(&self, table: &str, query: &Query) -> Result<u64> {
        let token = self.token().await?;
        self.backend.count(table, query, token.as_deref()).await
    }
}
