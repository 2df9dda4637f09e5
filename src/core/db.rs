use serde_json::json;

use crate::backend::Backend;
use crate::config::*;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::now_iso;
use crate::core::query_params::Query;
use crate::models::models::AuthUser;

pub const DEMO_PASSWORD: &str = "password";

/// Accounts created by [`init_demo_data`].
#[derive(Clone, Debug)]
pub struct DemoAccounts {
    pub test: AuthUser,
    pub alice: AuthUser,
    pub bob: AuthUser,
}

async fn demo_account(backend: &dyn Backend, name: &str, bio: &str) -> Result<AuthUser> {
    let email = format!("{}@wavelength.test", name);

    let user = match backend.sign_in_with_password(&email, DEMO_PASSWORD).await {
        Ok(session) => {
            backend.sign_out(&session.access_token).await?;
            session.user
        }
        Err(ApiError::Validation(_)) | Err(ApiError::Unauthorized) => {
            let response = backend
                .sign_up(&email, DEMO_PASSWORD, json!({ "display_name": name }))
                .await?;
            if let Some(session) = &response.session {
                backend.sign_out(&session.access_token).await?;
            }
            response.user
        }
        Err(e) => return Err(e),
    };

    let existing = backend
        .select(USERS_TABLE, &Query::new().eq("id", user.id.as_str()), None)
        .await?;
    if existing.is_empty() {
        backend
            .insert(
                USERS_TABLE,
                vec![json!({
                    "id": user.id,
                    "email": email,
                    "display_name": name,
                    "bio": bio,
                    "created_at": now_iso(),
                })],
                None,
            )
            .await?;
    }

    Ok(user)
}

async fn demo_posts(backend: &dyn Backend, user: &AuthUser, contents: &[&str]) -> Result<()> {
    let posted = backend
        .count(POSTS_TABLE, &Query::new().eq("user_id", user.id.as_str()), None)
        .await?;
    if posted > 0 {
        return Ok(());
    }

    let rows = contents
        .iter()
        .map(|content| {
            json!({
                "user_id": user.id,
                "content": content,
                "created_at": now_iso(),
            })
        })
        .collect();
    backend.insert(POSTS_TABLE, rows, None).await?;
    Ok(())
}

/// Seed three accounts with profiles and posts, with `test` following `bob`.
/// Running it again leaves existing data alone.
pub async fn init_demo_data(backend: &dyn Backend) -> Result<DemoAccounts> {
    let test = demo_account(backend, "test", "Test user bio").await?;
    let alice = demo_account(backend, "alice", "Hello, I'm Alice!").await?;
    let bob = demo_account(backend, "bob", "Bob's corner of the internet").await?;

    demo_posts(backend, &test, &["This is my first post on Wavelength!"]).await?;
    demo_posts(
        backend,
        &alice,
        &[
            "Welcome to my board! Excited to share thoughts here.",
            "Just finished an amazing project. Feeling productive today!",
        ],
    )
    .await?;
    demo_posts(
        backend,
        &bob,
        &["Hey everyone! Just joined Wavelength, looking forward to connecting with you all."],
    )
    .await?;

    let edge = Query::new()
        .eq("follower_id", test.id.as_str())
        .eq("following_id", bob.id.as_str());
    if backend.count(FOLLOWS_TABLE, &edge, None).await? == 0 {
        backend
            .insert(
                FOLLOWS_TABLE,
                vec![json!({
                    "follower_id": test.id,
                    "following_id": bob.id,
                    "created_at": now_iso(),
                })],
                None,
            )
            .await?;
    }

    Ok(DemoAccounts { test, alice, bob })
}
