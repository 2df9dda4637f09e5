use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use http::StatusCode;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde_json::Value;

use super::Backend;
use crate::config::BackendConfig;
use crate::core::errors::{ApiError, Result};
use crate::core::query_params::{parse_content_range, Query};
use crate::models::models::{AuthResponse, AuthUser, Session};

/// Backend over the hosted HTTP API: `/auth/v1` for credentials and
/// `/rest/v1/<table>` for rows.
#[derive(Clone)]
pub struct RestBackend {
    config: BackendConfig,
    http: HttpClient,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|e| ApiError::Config(format!("Invalid anon key: {}", e)))?;
        headers.insert("apikey", key);

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn bearer(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let token = token.unwrap_or(&self.config.anon_key);
        builder.header(AUTHORIZATION, format!("Bearer {}", token))
    }

    fn rest(&self, method: reqwest::Method, table: &str, query: &Query, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .http
            .request(method, self.config.rest_url(table))
            .query(&query.to_pairs());
        self.bearer(builder, token)
    }

    async fn session_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let resp = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header(AUTHORIZATION, format!("Bearer {}", self.config.anon_key))
            .json(&body)
            .send()
            .await?;
        let session: Session = checked(resp).await?.json().await?;
        Ok(session.with_expiry())
    }
}

/// Pull the human readable message out of an auth or table error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

async fn checked(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(%status, body = %body, "backend request failed");
    Err(ApiError::from_status(status, error_message(&body)))
}

async fn rows(resp: Response) -> Result<Vec<Value>> {
    let resp = checked(resp).await?;
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthResponse> {
        tracing::debug!(email, "auth sign up");
        let resp = self
            .http
            .post(self.config.auth_url("signup"))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.anon_key))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        let body: Value = checked(resp).await?.json().await?;

        // With email confirmation enabled the backend answers with the bare user.
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            let session = session.with_expiry();
            Ok(AuthResponse { user: session.user.clone(), session: Some(session) })
        } else {
            let user: AuthUser = serde_json::from_value(body.get("user").cloned().unwrap_or(body))?;
            Ok(AuthResponse { user, session: None })
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        tracing::debug!(email, "auth sign in");
        self.session_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        tracing::debug!("auth refresh");
        self.session_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        tracing::debug!("auth sign out");
        let resp = self
            .http
            .post(self.config.auth_url("logout"))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await?;
        checked(resp).await?;
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>> {
        tracing::debug!(table, "select");
        let resp = self.rest(reqwest::Method::GET, table, query, token).send().await?;
        rows(resp).await
    }

    async fn insert(&self, table: &str, new_rows: Vec<Value>, token: Option<&str>) -> Result<Vec<Value>> {
        tracing::debug!(table, count = new_rows.len(), "insert");
        let builder = self
            .http
            .post(self.config.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&new_rows);
        let resp = self.bearer(builder, token).send().await?;
        rows(resp).await
    }

    async fn update(&self, table: &str, query: &Query, patch: Value, token: Option<&str>) -> Result<Vec<Value>> {
        tracing::debug!(table, "update");
        let resp = self
            .rest(reqwest::Method::PATCH, table, query, token)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        rows(resp).await
    }

    async fn delete(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>> {
        tracing::debug!(table, "delete");
        let resp = self
            .rest(reqwest::Method::DELETE, table, query, token)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        rows(resp).await
    }

    async fn count(&self, table: &str, query: &Query, token: Option<&str>) -> Result<u64> {
        tracing::debug!(table, "count");
        let resp = self
            .rest(reqwest::Method::HEAD, table, query, token)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let resp = checked(resp).await?;
        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| ApiError::InternalError(format!("Missing row count for {}", table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_descriptive_fields() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"code":"23505","message":"duplicate key"}"#), "duplicate key");
        assert_eq!(error_message("gateway timeout "), "gateway timeout");
    }
}
