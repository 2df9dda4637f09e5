use serde_json::json;

use crate::backend::decode_rows;
use crate::client::Client;
use crate::config::{COMMENTS_TABLE, MAX_COMMENT_LENGTH};
use crate::core::errors::Result;
use crate::core::helpers::{is_blank, now_iso};
use crate::core::query_params::Query;
use crate::models::models::Comment;

/// Insert a comment carrying the author's display name and avatar.
/// Blank or over-long text is refused without a backend call.
pub async fn add_comment(
    client: &Client,
    user_id: &str,
    post_id: &str,
    text: &str,
    display_name: Option<&str>,
    photo_url: Option<&str>,
) -> bool {
    if is_blank(text) {
        return false;
    }
    let text = text.trim();
    if text.chars().count() > MAX_COMMENT_LENGTH {
        tracing::error!(user_id, post_id, "comment exceeds {} chars", MAX_COMMENT_LENGTH);
        return false;
    }

    let row = json!({
        "post_id": post_id,
        "user_id": user_id,
        "username": display_name.filter(|n| !n.is_empty()).unwrap_or("User"),
        "user_avatar": photo_url.unwrap_or(""),
        "text": text,
        "created_at": now_iso(),
    });

    match client.insert(COMMENTS_TABLE, row).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(user_id, post_id, error = %e, "error adding comment");
            false
        }
    }
}

/// Comments on a post, oldest first.
pub async fn list_comments(client: &Client, post_id: &str) -> Result<Vec<Comment>> {
    let query = Query::new().eq("post_id", post_id).order_asc("created_at");
    decode_rows(client.select(COMMENTS_TABLE, &query).await?)
}
