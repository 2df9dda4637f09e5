use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::Backend;
use crate::config::*;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{new_id, now_iso};
use crate::core::query_params::{Filter, Query};
use crate::models::models::{AuthResponse, AuthUser, Session};

const AUTH: &str = "auth";
const SESSION_TTL_SECS: i64 = 3600;

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<ApiError>>,
}

/// In-process backend. Rows are JSON objects; `id` and `created_at` are filled
/// in on insert and per-table unique keys are enforced.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

fn unique_keys(table: &str) -> &'static [&'static [&'static str]] {
    match table {
        POST_REACTIONS_TABLE => &[&["id"], &["post_id", "user_id"]],
        FOLLOW_REQUESTS_TABLE => &[&["id"], &["from_user_id", "to_user_id"]],
        FOLLOWS_TABLE => &[&["id"], &["follower_id", "following_id"]],
        _ => &[&["id"]],
    }
}

fn field(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => field(row, column).as_deref() == Some(value.as_str()),
        Filter::In(column, values) => field(row, column).map_or(false, |v| values.contains(&v)),
    })
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `op` against `target` (a table name, or `"auth"`) fail with `err`.
    pub fn fail_next(&self, op: &str, target: &str, err: ApiError) {
        self.inner()
            .failures
            .entry(format!("{} {}", op, target))
            .or_default()
            .push_back(err);
    }

    /// Every backend call so far, as `"<op> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.inner().calls.clone()
    }

    pub fn call_count(&self, op: &str, target: &str) -> usize {
        let key = format!("{} {}", op, target);
        self.inner().calls.iter().filter(|c| **c == key).count()
    }

    pub fn clear_calls(&self) {
        self.inner().calls.clear();
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner().tables.get(table).cloned().unwrap_or_default()
    }

    fn record(&self, op: &str, target: &str) -> Result<MutexGuard<'_, Inner>> {
        let key = format!("{} {}", op, target);
        let mut inner = self.inner();
        inner.calls.push(key.clone());
        if let Some(err) = inner.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(inner)
    }
}

impl Inner {
    fn issue_session(&mut self, user: AuthUser) -> Session {
        let access_token = new_id();
        let refresh_token = new_id();
        self.access_tokens.insert(access_token.clone(), user.id.clone());
        self.refresh_tokens.insert(refresh_token.clone(), user.id.clone());
        Session {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: Some(SESSION_TTL_SECS),
            expires_at: None,
            user,
        }
        .with_expiry()
    }

    fn user_by_id(&self, user_id: &str) -> Option<AuthUser> {
        self.accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    fn check_unique(&self, table: &str, row: &Value) -> Result<()> {
        let existing = self.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        for key in unique_keys(table) {
            let clash = existing.iter().any(|other| {
                key.iter()
                    .all(|column| field(row, column).is_some() && field(row, column) == field(other, column))
            });
            if clash {
                return Err(ApiError::Conflict(format!(
                    "duplicate key value violates unique constraint on {}({})",
                    table,
                    key.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthResponse> {
        let mut inner = self.record("sign_up", AUTH)?;
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("Unable to validate email address: invalid format".to_string()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::Validation(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        let email = email.trim().to_lowercase();
        if inner.accounts.contains_key(&email) {
            return Err(ApiError::Validation("User already registered".to_string()));
        }

        let user = AuthUser {
            id: new_id(),
            email: Some(email.clone()),
            user_metadata: metadata,
            created_at: Some(now_iso()),
        };
        inner.accounts.insert(
            email,
            Account { user: user.clone(), password: password.to_string() },
        );
        let session = inner.issue_session(user.clone());
        Ok(AuthResponse { user, session: Some(session) })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let mut inner = self.record("sign_in", AUTH)?;
        let user = match inner.accounts.get(&email.trim().to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(ApiError::Validation("Invalid login credentials".to_string())),
        };
        Ok(inner.issue_session(user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let mut inner = self.record("refresh", AUTH)?;
        let user_id = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(ApiError::Unauthorized)?;
        let user = inner.user_by_id(&user_id).ok_or(ApiError::Unauthorized)?;
        Ok(inner.issue_session(user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut inner = self.record("sign_out", AUTH)?;
        if let Some(user_id) = inner.access_tokens.remove(access_token) {
            inner.refresh_tokens.retain(|_, uid| *uid != user_id);
        }
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query, _token: Option<&str>) -> Result<Vec<Value>> {
        let inner = self.record("select", table)?;
        let mut rows: Vec<Value> = inner
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, ascending)) = &query.order {
            if *ascending {
                rows.sort_by(|a, b| field(a, column).cmp(&field(b, column)));
            } else {
                // Newest insert first among equal keys.
                rows.reverse();
                rows.sort_by(|a, b| field(b, column).cmp(&field(a, column)));
            }
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&self, table: &str, new_rows: Vec<Value>, _token: Option<&str>) -> Result<Vec<Value>> {
        let mut inner = self.record("insert", table)?;
        let mut stored = Vec::with_capacity(new_rows.len());

        for mut row in new_rows {
            let obj = row
                .as_object_mut()
                .ok_or_else(|| ApiError::Validation("Rows must be JSON objects".to_string()))?;
            obj.entry("id").or_insert_with(|| Value::String(new_id()));
            obj.entry("created_at").or_insert_with(|| Value::String(now_iso()));

            inner.check_unique(table, &row)?;
            for earlier in &stored {
                if unique_keys(table).iter().any(|key| {
                    key.iter().all(|c| field(&row, c).is_some() && field(&row, c) == field(earlier, c))
                }) {
                    return Err(ApiError::Conflict(format!("duplicate rows in insert into {}", table)));
                }
            }
            stored.push(row);
        }

        inner.tables.entry(table.to_string()).or_default().extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value, _token: Option<&str>) -> Result<Vec<Value>> {
        let mut inner = self.record("update", table)?;
        let patch = patch
            .as_object()
            .cloned()
            .ok_or_else(|| ApiError::Validation("Patch must be a JSON object".to_string()))?;

        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches(r, &query.filters)) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in &patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query, _token: Option<&str>) -> Result<Vec<Value>> {
        let mut inner = self.record("delete", table)?;
        let mut removed = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            let (gone, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| matches(r, &query.filters));
            *rows = kept;
            removed = gone;
        }
        Ok(removed)
    }

    async fn count(&self, table: &str, query: &Query, _token: Option<&str>) -> Result<u64> {
        let inner = self.record("count", table)?;
        let count = inner
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unique_pairs_are_enforced() {
        let backend = MemoryBackend::new();
        let row = json!({"from_user_id": "a", "to_user_id": "b"});
        backend.insert(FOLLOW_REQUESTS_TABLE, vec![row.clone()], None).await.unwrap();
        let err = backend.insert(FOLLOW_REQUESTS_TABLE, vec![row], None).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let backend = MemoryBackend::new();
        backend.fail_next("select", POSTS_TABLE, ApiError::Network("down".to_string()));
        assert!(backend.select(POSTS_TABLE, &Query::new(), None).await.is_err());
        assert!(backend.select(POSTS_TABLE, &Query::new(), None).await.is_ok());
        assert_eq!(backend.call_count("select", POSTS_TABLE), 2);
    }
}
