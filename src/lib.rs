// === Infrastructure ===
pub mod backend;
pub mod client;
pub mod config;
pub mod core;
pub mod models;
pub mod session;
pub mod storage;

// === Auth ===
pub mod auth;
pub mod users;

// === Social ===
pub mod comments;
pub mod follow;
pub mod posts;
pub mod reactions;

// === View layer boundary ===
pub mod handlers;

pub use auth::{AuthManager, AuthPhase, AuthState, AuthSubscription, AuthTransition};
pub use backend::{Backend, MemoryBackend, RestBackend};
pub use client::Client;
pub use config::BackendConfig;
pub use crate::core::errors::{ApiError, Result};
pub use session::SessionStore;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
