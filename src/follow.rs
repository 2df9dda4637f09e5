use serde_json::json;

use crate::backend::{decode_row, decode_rows};
use crate::client::Client;
use crate::config::*;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::now_iso;
use crate::core::query_params::Query;
use crate::models::models::{Follow, FollowRequest};

fn request_between(from_user_id: &str, to_user_id: &str) -> Query {
    Query::new()
        .eq("from_user_id", from_user_id)
        .eq("to_user_id", to_user_id)
}

fn follow_between(follower_id: &str, following_id: &str) -> Query {
    Query::new()
        .eq("follower_id", follower_id)
        .eq("following_id", following_id)
}

async fn request_follow(client: &Client, from_user_id: &str, to_user_id: &str) -> Result<()> {
    match client
        .select_single(FOLLOW_REQUESTS_TABLE, &request_between(from_user_id, to_user_id).select("id"))
        .await
    {
        Ok(_) => return Ok(()),
        Err(ApiError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let row = json!({
        "from_user_id": from_user_id,
        "to_user_id": to_user_id,
        "created_at": now_iso(),
    });
    match client.insert(FOLLOW_REQUESTS_TABLE, row).await {
        // Another call created the same request first.
        Ok(_) | Err(ApiError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Ask to follow `to_user_id`. Asking twice is a no-op; following yourself
/// is refused without a backend call.
pub async fn follow_user(client: &Client, from_user_id: &str, to_user_id: &str) -> bool {
    if from_user_id == to_user_id {
        return false;
    }

    match request_follow(client, from_user_id, to_user_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(from_user_id, to_user_id, error = %e, "error requesting follow");
            false
        }
    }
}

async fn remove_follow(client: &Client, follower_id: &str, following_id: &str) -> Result<()> {
    client.delete(FOLLOWS_TABLE, &follow_between(follower_id, following_id)).await?;
    client
        .delete(FOLLOW_REQUESTS_TABLE, &request_between(follower_id, following_id))
        .await?;
    Ok(())
}

/// Remove the single follow edge (and any pending request) from
/// `follower_id` to `following_id`.
pub async fn unfollow_user(client: &Client, follower_id: &str, following_id: &str) -> bool {
    if follower_id == following_id {
        return false;
    }

    match remove_follow(client, follower_id, following_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(follower_id, following_id, error = %e, "error unfollowing user");
            false
        }
    }
}

async fn accept_request(client: &Client, request_id: &str, acting_user_id: &str) -> Result<()> {
    let request: FollowRequest = decode_row(
        client
            .select_single(FOLLOW_REQUESTS_TABLE, &Query::new().eq("id", request_id))
            .await?,
    )?;
    if request.to_user_id != acting_user_id {
        return Err(ApiError::Forbidden);
    }

    let edge = follow_between(&request.from_user_id, &request.to_user_id);
    if client.count(FOLLOWS_TABLE, &edge).await? == 0 {
        client
            .insert(
                FOLLOWS_TABLE,
                json!({
                    "follower_id": request.from_user_id,
                    "following_id": request.to_user_id,
                    "created_at": now_iso(),
                }),
            )
            .await?;
    }
    client
        .delete(FOLLOW_REQUESTS_TABLE, &Query::new().eq("id", request_id))
        .await?;
    Ok(())
}

/// Turn a pending request addressed to `acting_user_id` into a follow.
pub async fn accept_follow_request(client: &Client, request_id: &str, acting_user_id: &str) -> bool {
    match accept_request(client, request_id, acting_user_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(request_id, acting_user_id, error = %e, "error accepting follow request");
            false
        }
    }
}

/// Requests waiting for `user_id` to accept, oldest first.
pub async fn pending_follow_requests(client: &Client, user_id: &str) -> Result<Vec<FollowRequest>> {
    let query = Query::new().eq("to_user_id", user_id).order_asc("created_at");
    decode_rows(client.select(FOLLOW_REQUESTS_TABLE, &query).await?)
}

pub async fn get_followings(client: &Client, user_id: &str) -> Result<Vec<String>> {
    let follows: Vec<Follow> =
        decode_rows(client.select(FOLLOWS_TABLE, &Query::new().eq("follower_id", user_id)).await?)?;
    Ok(follows.into_iter().map(|f| f.following_id).collect())
}

pub async fn get_followers(client: &Client, user_id: &str) -> Result<Vec<String>> {
    let follows: Vec<Follow> =
        decode_rows(client.select(FOLLOWS_TABLE, &Query::new().eq("following_id", user_id)).await?)?;
    Ok(follows.into_iter().map(|f| f.follower_id).collect())
}
