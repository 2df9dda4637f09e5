//! Authentication session manager.
//!
//! Holds the `{user, profile, loading}` state the view layer renders from.
//! State only changes through [`AuthState::apply`]; the manager publishes each
//! new state on a `watch` channel. Session establishment and loss arrive
//! either from the manager's own operations or from the session store's
//! broadcast, which [`AuthManager::subscribe_to_auth_changes`] listens to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::client::Client;
use crate::config::MIN_PASSWORD_LENGTH;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{fallback_display_name, is_blank};
use crate::models::models::{AuthEvent, AuthUser, UserProfile};
use crate::users;

#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub profile: Option<UserProfile>,
    pub loading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    Loading,
    Unauthenticated,
    Authenticated,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthTransition {
    SessionStarted(AuthUser),
    ProfileLoaded { user_id: String, profile: Option<UserProfile> },
    SignedOut,
    LoadingFinished,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { user: None, profile: None, loading: true }
    }
}

impl AuthState {
    pub fn apply(&self, transition: AuthTransition) -> AuthState {
        let mut next = self.clone();
        match transition {
            AuthTransition::SessionStarted(user) => {
                let same_user = next.user.as_ref().map_or(false, |u| u.id == user.id);
                if !same_user {
                    next.profile = None;
                }
                next.user = Some(user);
            }
            AuthTransition::ProfileLoaded { user_id, profile } => {
                // A profile for someone who is no longer signed in is dropped.
                if next.user.as_ref().map_or(false, |u| u.id == user_id) {
                    next.profile = profile;
                }
            }
            AuthTransition::SignedOut => {
                next.user = None;
                next.profile = None;
            }
            AuthTransition::LoadingFinished => next.loading = false,
        }
        next
    }

    pub fn phase(&self) -> AuthPhase {
        match (&self.user, self.loading) {
            (_, true) => AuthPhase::Loading,
            (None, false) => AuthPhase::Unauthenticated,
            (Some(_), false) => AuthPhase::Authenticated,
        }
    }
}

/// Listener task for session changes. Dropping it (or calling
/// [`AuthSubscription::unsubscribe`]) stops the listener.
pub struct AuthSubscription {
    task: Option<JoinHandle<()>>,
}

impl AuthSubscription {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

// Ends the startup loading state however `initialize` exits.
struct LoadingGuard<'a>(&'a AuthManager);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.transition(AuthTransition::LoadingFinished);
    }
}

#[derive(Clone)]
pub struct AuthManager {
    client: Client,
    state: Arc<watch::Sender<AuthState>>,
    profile_epoch: Arc<AtomicU64>,
}

impl AuthManager {
    pub fn new(client: Client) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            client,
            state: Arc::new(state),
            profile_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn transition(&self, transition: AuthTransition) {
        self.state.send_modify(|state| *state = state.apply(transition));
    }

    /// Load and publish the profile for `user_id`. Only the most recently
    /// started load may publish, so a slow stale load cannot overwrite a
    /// newer result.
    async fn refresh_profile(&self, user_id: &str) -> Option<UserProfile> {
        let epoch = self.profile_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let profile = users::load_profile(&self.client, user_id).await;
        if self.profile_epoch.load(Ordering::SeqCst) == epoch {
            self.transition(AuthTransition::ProfileLoaded {
                user_id: user_id.to_string(),
                profile: profile.clone(),
            });
        }
        profile
    }

    /// Restore the persisted session once at startup.
    pub async fn initialize(&self) {
        let _loading = LoadingGuard(self);

        match self.client.sessions().get_session().await {
            Ok(Some(session)) => {
                let user = session.user;
                tracing::info!(user_id = %user.id, "restored session");
                self.transition(AuthTransition::SessionStarted(user.clone()));
                self.refresh_profile(&user.id).await;
            }
            Ok(None) => tracing::info!("no stored session"),
            Err(e) => tracing::error!(error = %e, "error checking user"),
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        match event.user() {
            Some(user) => {
                tracing::debug!(kind = ?event.kind, user_id = %user.id, "auth change");
                self.transition(AuthTransition::SessionStarted(user.clone()));
                self.refresh_profile(&user.id).await;
            }
            None => {
                tracing::debug!(kind = ?event.kind, "auth change without session");
                self.transition(AuthTransition::SignedOut);
            }
        }
    }

    /// Follow session changes until the returned handle is dropped.
    pub fn subscribe_to_auth_changes(&self) -> AuthSubscription {
        let mut rx = self.client.sessions().subscribe();
        let manager = self.clone();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => manager.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "auth listener lagged, resynchronising");
                        manager.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        AuthSubscription { task: Some(task) }
    }

    async fn resync(&self) {
        match self.client.sessions().get_session().await {
            Ok(Some(session)) => {
                self.transition(AuthTransition::SessionStarted(session.user.clone()));
                self.refresh_profile(&session.user.id).await;
            }
            Ok(None) => self.transition(AuthTransition::SignedOut),
            Err(e) => tracing::error!(error = %e, "error resynchronising session"),
        }
    }

    /// Create the account and its profile row, then sign in as it.
    ///
    /// If the profile row cannot be created the new session is signed out
    /// again and the error returned; the next successful [`login`] recreates
    /// the missing row.
    ///
    /// [`login`]: AuthManager::login
    pub async fn signup(&self, email: &str, password: &str, display_name: &str) -> Result<AuthUser> {
        validate_signup(email, password, display_name)?;

        let response = self
            .client
            .sessions()
            .sign_up(email.trim(), password, json!({ "display_name": display_name.trim() }))
            .await?;
        let user = response.user;
        let email = user.email.clone().unwrap_or_else(|| email.trim().to_string());

        if let Err(e) = users::create_profile(&self.client, &user.id, &email, display_name).await {
            tracing::warn!(user_id = %user.id, error = %e, "profile creation failed after signup, signing out");
            if response.session.is_some() {
                if let Err(sign_out_err) = self.client.sessions().sign_out().await {
                    tracing::error!(error = %sign_out_err, "compensating sign out failed");
                }
                self.transition(AuthTransition::SignedOut);
            }
            return Err(e);
        }

        if response.session.is_some() {
            self.transition(AuthTransition::SessionStarted(user.clone()));
            self.refresh_profile(&user.id).await;
        } else {
            tracing::info!(user_id = %user.id, "signup pending email confirmation");
        }
        Ok(user)
    }

    /// Sign in and load the profile before returning, so the caller can route
    /// straight to the app. This direct load is intentional even while a
    /// subscription is active: the listener's load for the same `SignedIn`
    /// event is a second fetch, and the profile epoch keeps only the newest
    /// result. A missing profile row is recreated here.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        if is_blank(email) || password.is_empty() {
            return Err(ApiError::Validation("Please fill in all fields".to_string()));
        }

        let session = self.client.sessions().sign_in(email.trim(), password).await?;
        let user = session.user;
        self.transition(AuthTransition::SessionStarted(user.clone()));

        if self.refresh_profile(&user.id).await.is_none() {
            self.repair_profile(&user).await;
        }
        Ok(user)
    }

    // Recreate a profile row that a failed signup left missing.
    async fn repair_profile(&self, user: &AuthUser) {
        if !matches!(users::fetch_profile(&self.client, &user.id).await, Ok(None)) {
            return;
        }

        let email = user.email.clone().unwrap_or_default();
        let name = user
            .metadata_display_name()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_display_name(&email));

        match users::create_profile(&self.client, &user.id, &email, &name).await {
            Ok(_) => {
                tracing::info!(user_id = %user.id, "recreated missing profile");
                self.refresh_profile(&user.id).await;
            }
            Err(e) => tracing::error!(user_id = %user.id, error = %e, "could not recreate missing profile"),
        }
    }

    /// Clears user and profile whatever the backend answers; its error, if
    /// any, is still returned.
    pub async fn logout(&self) -> Result<()> {
        let result = self.client.sessions().sign_out().await;
        self.transition(AuthTransition::SignedOut);
        result
    }
}

pub fn validate_signup(email: &str, password: &str, display_name: &str) -> Result<()> {
    if is_blank(email) || password.is_empty() || is_blank(display_name) {
        return Err(ApiError::Validation("Please fill in all fields".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> AuthUser {
        AuthUser { id: id.to_string(), email: None, user_metadata: serde_json::Value::Null, created_at: None }
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: None,
            display_name: Some(id.to_string()),
            bio: None,
            photo_url: None,
            created_at: None,
        }
    }

    #[test]
    fn switching_user_drops_previous_profile() {
        let state = AuthState::default()
            .apply(AuthTransition::SessionStarted(user("a")))
            .apply(AuthTransition::ProfileLoaded { user_id: "a".into(), profile: Some(profile("a")) })
            .apply(AuthTransition::SessionStarted(user("b")));
        assert_eq!(state.user.map(|u| u.id), Some("b".to_string()));
        assert!(state.profile.is_none());
    }

    #[test]
    fn stale_profile_is_ignored() {
        let state = AuthState::default()
            .apply(AuthTransition::SessionStarted(user("b")))
            .apply(AuthTransition::ProfileLoaded { user_id: "a".into(), profile: Some(profile("a")) });
        assert!(state.profile.is_none());
    }

    #[test]
    fn phase_follows_session_not_profile() {
        let state = AuthState::default();
        assert_eq!(state.phase(), AuthPhase::Loading);
        let state = state.apply(AuthTransition::LoadingFinished);
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        let state = state.apply(AuthTransition::SessionStarted(user("a")));
        assert_eq!(state.phase(), AuthPhase::Authenticated);
    }

    #[test]
    fn short_passwords_are_rejected() {
        let err = validate_signup("a@b.co", "abc", "Ann").unwrap_err();
        assert_eq!(err, ApiError::Validation("Password must be at least 6 characters".to_string()));
    }
}
