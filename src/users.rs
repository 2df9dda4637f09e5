use serde_json::json;

use crate::backend::{decode_row, first_row};
use crate::client::Client;
use crate::config::*;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{is_blank, now_iso};
use crate::core::query_params::Query;
use crate::models::models::{ProfileStats, ProfileUpdate, UserProfile};

/// Profile row for `user_id`, distinguishing "no such row" from a failed fetch.
pub async fn fetch_profile(client: &Client, user_id: &str) -> Result<Option<UserProfile>> {
    let query = Query::new().eq("id", user_id);
    match client.select_single(USERS_TABLE, &query).await {
        Ok(row) => Ok(Some(decode_row(row)?)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Profile row for `user_id`, or `None` when it is absent or could not be
/// fetched. Failures are logged, not returned.
pub async fn load_profile(client: &Client, user_id: &str) -> Option<UserProfile> {
    match fetch_profile(client, user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(user_id, error = %e, "error fetching user profile");
            None
        }
    }
}

pub async fn create_profile(client: &Client, user_id: &str, email: &str, display_name: &str) -> Result<UserProfile> {
    let rows = client
        .insert(
            USERS_TABLE,
            json!({
                "id": user_id,
                "email": email,
                "display_name": display_name.trim(),
                "bio": "",
                "created_at": now_iso(),
            }),
        )
        .await?;
    first_row(rows, USERS_TABLE)
}

pub async fn update_profile(client: &Client, user_id: &str, update: ProfileUpdate) -> Result<UserProfile> {
    let mut update = update;

    if let Some(name) = &update.display_name {
        if is_blank(name) {
            return Err(ApiError::Validation("Display name cannot be empty".to_string()));
        }
        update.display_name = Some(name.trim().to_string());
    }
    if let Some(bio) = &update.bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(ApiError::Validation(format!("Bio too long (max {} chars)", MAX_BIO_LENGTH)));
        }
        update.bio = Some(bio.trim().to_string());
    }
    if update == ProfileUpdate::default() {
        return Err(ApiError::Validation("Nothing to update".to_string()));
    }

    let rows = client
        .update(USERS_TABLE, &Query::new().eq("id", user_id), serde_json::to_value(&update)?)
        .await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    first_row(rows, USERS_TABLE)
}

pub async fn profile_stats(client: &Client, user_id: &str) -> Result<ProfileStats> {
    let posts_count = client.count(POSTS_TABLE, &Query::new().eq("user_id", user_id)).await?;
    let followers_count = client
        .count(FOLLOWS_TABLE, &Query::new().eq("following_id", user_id))
        .await?;
    let following_count = client
        .count(FOLLOWS_TABLE, &Query::new().eq("follower_id", user_id))
        .await?;

    Ok(ProfileStats { posts_count, followers_count, following_count })
}
