//! Persisted session slot plus change notifications.
//!
//! The store restores the session from [`SessionStorage`] on first access,
//! refreshes it once it is about to expire, and broadcasts an [`AuthEvent`]
//! whenever a session is established, refreshed or dropped. Restoring a
//! stored session is not a change and is not broadcast.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::backend::Backend;
use crate::config::refresh_margin_secs;
use crate::core::errors::{ApiError, Result};
use crate::models::models::{AuthEvent, AuthEventKind, AuthResponse, Session};
use crate::storage::SessionStorage;

const EVENT_CAPACITY: usize = 16;

enum Slot {
    Unloaded,
    Loaded(Option<Session>),
}

pub struct SessionStore {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn SessionStorage>,
    slot: Mutex<Slot>,
    events: broadcast::Sender<AuthEvent>,
    refresh_margin: i64,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn SessionStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            storage,
            slot: Mutex::new(Slot::Unloaded),
            events,
            refresh_margin: refresh_margin_secs(),
        }
    }

    pub fn with_refresh_margin(mut self, secs: i64) -> Self {
        self.refresh_margin = secs;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current session, restored from storage and refreshed when expired.
    ///
    /// A refresh the backend rejects drops the session (and broadcasts
    /// `SignedOut`); a refresh that fails for any other reason is returned as
    /// an error and the stored session is kept for the next attempt.
    pub async fn get_session(&self) -> Result<Option<Session>> {
        let mut slot = self.slot.lock().await;
        let session = match &*slot {
            Slot::Loaded(session) => session.clone(),
            Slot::Unloaded => {
                let restored = self.storage.load().await?;
                *slot = Slot::Loaded(restored.clone());
                restored
            }
        };

        let session = match session {
            Some(s) if s.is_expired(self.refresh_margin) => s,
            other => return Ok(other),
        };

        match self.backend.refresh_session(&session.refresh_token).await {
            Ok(fresh) => {
                tracing::info!(user_id = %fresh.user.id, "session refreshed");
                self.persist(&fresh).await;
                *slot = Slot::Loaded(Some(fresh.clone()));
                self.emit(AuthEventKind::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(err @ (ApiError::Network(_) | ApiError::Backend { .. })) => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "stored session rejected, signing out");
                self.forget().await;
                *slot = Slot::Loaded(None);
                self.emit(AuthEventKind::SignedOut, None);
                Ok(None)
            }
        }
    }

    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.get_session().await?.map(|s| s.access_token))
    }

    pub async fn sign_up(&self, email: &str, password: &str, metadata: serde_json::Value) -> Result<AuthResponse> {
        let response = self.backend.sign_up(email, password, metadata).await?;
        if let Some(session) = &response.session {
            self.establish(session.clone()).await;
        }
        Ok(response)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        self.establish(session.clone()).await;
        Ok(session)
    }

    /// Drops the local session first, then revokes it on the backend. The
    /// local state is cleared even when revocation fails.
    pub async fn sign_out(&self) -> Result<()> {
        let previous = {
            let mut slot = self.slot.lock().await;
            let previous = match std::mem::replace(&mut *slot, Slot::Loaded(None)) {
                Slot::Loaded(session) => session,
                Slot::Unloaded => None,
            };
            self.forget().await;
            previous
        };
        tracing::info!("signed out");
        self.emit(AuthEventKind::SignedOut, None);

        match previous {
            Some(session) => self.backend.sign_out(&session.access_token).await,
            None => Ok(()),
        }
    }

    async fn establish(&self, session: Session) {
        let mut slot = self.slot.lock().await;
        self.persist(&session).await;
        *slot = Slot::Loaded(Some(session.clone()));
        tracing::info!(user_id = %session.user.id, "signed in");
        self.emit(AuthEventKind::SignedIn, Some(session));
    }

    async fn persist(&self, session: &Session) {
        if let Err(e) = self.storage.save(session).await {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    async fn forget(&self) {
        if let Err(e) = self.storage.clear().await {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        // No receivers is not an error.
        let _ = self.events.send(AuthEvent { kind, session });
    }
}
