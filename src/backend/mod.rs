//! The hosted backend boundary.
//!
//! Everything durable lives behind [`Backend`]: credential sign-up/sign-in,
//! token refresh and sign-out on the auth side, and filtered row access on the
//! table side. [`RestBackend`] speaks the real HTTP surface; [`MemoryBackend`]
//! keeps rows in process for tests and offline use.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::errors::{ApiError, Result};
use crate::core::query_params::Query;
use crate::models::models::{AuthResponse, Session};

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthResponse>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn select(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>>;
    /// Inserts rows and returns them as stored.
    async fn insert(&self, table: &str, rows: Vec<Value>, token: Option<&str>) -> Result<Vec<Value>>;
    /// Patches every matching row and returns the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value, token: Option<&str>) -> Result<Vec<Value>>;
    /// Deletes every matching row and returns the deleted rows.
    async fn delete(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>>;
    async fn count(&self, table: &str, query: &Query, token: Option<&str>) -> Result<u64>;

    /// Exactly one matching row, or `NotFound` / `Conflict`.
    async fn select_single(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Value> {
        let mut rows = self.select(table, &query.clone().limit(2), token).await?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(ApiError::NotFound(format!("No row in {} matches the filter", table))),
            _ => Err(ApiError::Conflict(format!("More than one row in {} matches the filter", table))),
        }
    }
}

/// Decode a list of rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ApiError::from))
        .collect()
}

pub fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// First row of an insert/update response.
pub fn first_row<T: DeserializeOwned>(rows: Vec<Value>, table: &str) -> Result<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::InternalError(format!("Backend returned no row for {}", table)))?;
    decode_row(row)
}
