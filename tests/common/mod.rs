#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wavelength::backend::Backend;
use wavelength::config::USERS_TABLE;
use wavelength::models::models::{AuthUser, Session};
use wavelength::{AuthManager, AuthState, Client, MemoryBackend, MemoryStorage};

pub const PASSWORD: &str = "secret123";

pub fn email(name: &str) -> String {
    format!("{}@example.com", name)
}

/// Account plus profile row, with no session left open.
pub async fn register(backend: &MemoryBackend, name: &str) -> AuthUser {
    let response = backend
        .sign_up(&email(name), PASSWORD, json!({ "display_name": name }))
        .await
        .unwrap();
    backend
        .insert(
            USERS_TABLE,
            vec![json!({
                "id": response.user.id,
                "email": email(name),
                "display_name": name,
                "bio": "",
            })],
            None,
        )
        .await
        .unwrap();
    response.user
}

pub async fn session_for(backend: &MemoryBackend, name: &str) -> Session {
    backend.sign_in_with_password(&email(name), PASSWORD).await.unwrap()
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub storage: Arc<MemoryStorage>,
    pub client: Client,
    pub auth: AuthManager,
}

pub fn harness(backend: Arc<MemoryBackend>, storage: MemoryStorage) -> Harness {
    let storage = Arc::new(storage);
    let client = Client::new(backend.clone(), storage.clone());
    let auth = AuthManager::new(client.clone());
    Harness { backend, storage, client, auth }
}

pub async fn wait_until<F>(auth: &AuthManager, mut pred: F) -> AuthState
where
    F: FnMut(&AuthState) -> bool,
{
    let mut rx = auth.watch();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| pred(s)))
        .await
        .expect("timed out waiting for auth state")
        .expect("auth state channel closed")
        .clone();
    state
}
