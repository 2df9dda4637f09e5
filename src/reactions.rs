use serde_json::json;

use crate::client::Client;
use crate::config::POST_REACTIONS_TABLE;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::now_iso;
use crate::core::query_params::Query;
use crate::models::models::ReactionKind;

fn own_reaction(user_id: &str, post_id: &str) -> Query {
    Query::new().eq("post_id", post_id).eq("user_id", user_id)
}

/// Set the user's own reaction on the post. An existing row is switched in
/// place, so a failed write leaves the previous reaction intact. Other users'
/// reactions are untouched.
async fn set_reaction(client: &Client, user_id: &str, post_id: &str, kind: ReactionKind) -> Result<()> {
    let switched = client
        .update(POST_REACTIONS_TABLE, &own_reaction(user_id, post_id), json!({ "kind": kind }))
        .await?;
    if !switched.is_empty() {
        return Ok(());
    }

    let row = json!({
        "post_id": post_id,
        "user_id": user_id,
        "kind": kind,
        "created_at": now_iso(),
    });
    match client.insert(POST_REACTIONS_TABLE, row).await {
        Ok(_) => Ok(()),
        // Inserted concurrently; switch that row instead.
        Err(ApiError::Conflict(_)) => {
            client
                .update(POST_REACTIONS_TABLE, &own_reaction(user_id, post_id), json!({ "kind": kind }))
                .await?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn react_to_post(client: &Client, user_id: &str, post_id: &str, kind: ReactionKind) -> bool {
    match set_reaction(client, user_id, post_id, kind).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(user_id, post_id, kind = kind.as_str(), error = %e, "error reacting to post");
            false
        }
    }
}

pub async fn agree_with_post(client: &Client, user_id: &str, post_id: &str) -> bool {
    react_to_post(client, user_id, post_id, ReactionKind::Agree).await
}

pub async fn disagree_with_post(client: &Client, user_id: &str, post_id: &str) -> bool {
    react_to_post(client, user_id, post_id, ReactionKind::Disagree).await
}

pub async fn clear_reaction(client: &Client, user_id: &str, post_id: &str) -> bool {
    match client.delete(POST_REACTIONS_TABLE, &own_reaction(user_id, post_id)).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(user_id, post_id, error = %e, "error clearing reaction");
            false
        }
    }
}
