use std::collections::{HashMap, HashSet};

use serde_json::json;

use crate::backend::{decode_rows, first_row};
use crate::client::Client;
use crate::config::*;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::now_iso;
use crate::core::query_params::Query;
use crate::models::models::{FeedItem, Post, PostReaction, ReactionKind, UserProfile};

fn validate_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("Please write something".to_string()));
    }
    if content.chars().count() > MAX_POST_LENGTH {
        return Err(ApiError::Validation(format!("Post is too long (max {} chars)", MAX_POST_LENGTH)));
    }
    Ok(content.to_string())
}

pub async fn create_post(client: &Client, user_id: &str, content: &str) -> Result<Post> {
    let content = validate_content(content)?;
    let rows = client
        .insert(
            POSTS_TABLE,
            json!({
                "user_id": user_id,
                "content": content,
                "created_at": now_iso(),
            }),
        )
        .await?;
    first_row(rows, POSTS_TABLE)
}

pub async fn edit_post(client: &Client, post_id: &str, content: &str) -> Result<Post> {
    let content = validate_content(content)?;
    let rows = client
        .update(
            POSTS_TABLE,
            &Query::new().eq("id", post_id),
            json!({ "content": content, "updated_at": now_iso() }),
        )
        .await?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }
    first_row(rows, POSTS_TABLE)
}

/// `false` when the post could not be deleted, including when no post has
/// that id. The cause is logged.
pub async fn delete_post(client: &Client, post_id: &str) -> bool {
    match client.delete(POSTS_TABLE, &Query::new().eq("id", post_id)).await {
        Ok(rows) if !rows.is_empty() => true,
        Ok(_) => {
            let err = ApiError::NotFound(format!("Post {} not found", post_id));
            tracing::error!(post_id, error = %err, "error deleting post");
            false
        }
        Err(e) => {
            tracing::error!(post_id, error = %e, "error deleting post");
            false
        }
    }
}

pub async fn get_post(client: &Client, post_id: &str) -> Result<Post> {
    let row = client.select_single(POSTS_TABLE, &Query::new().eq("id", post_id)).await?;
    Ok(serde_json::from_value(row)?)
}

pub async fn list_user_posts(client: &Client, user_id: &str, page: usize) -> Result<Vec<Post>> {
    let query = Query::new()
        .eq("user_id", user_id)
        .order_desc("created_at")
        .page(page, POSTS_PER_PAGE);
    decode_rows(client.select(POSTS_TABLE, &query).await?)
}

/// One page of the global feed, newest first, with author, comment and
/// reaction details attached. Counts come from the backend's row counts, not
/// from downloaded rows. `viewer` fills in [`FeedItem::my_reaction`].
pub async fn list_feed(client: &Client, viewer: Option<&str>, page: usize) -> Result<Vec<FeedItem>> {
    let query = Query::new().order_desc("created_at").page(page, POSTS_PER_PAGE);
    let posts: Vec<Post> = decode_rows(client.select(POSTS_TABLE, &query).await?)?;
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let author_ids: Vec<String> = posts
        .iter()
        .map(|p| p.user_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<String, UserProfile> = decode_rows::<UserProfile>(
        client
            .select(USERS_TABLE, &Query::new().in_list("id", author_ids))
            .await?,
    )?
    .into_iter()
    .map(|u| (u.id.clone(), u))
    .collect();

    let mine: HashMap<String, ReactionKind> = match viewer {
        Some(viewer) => decode_rows::<PostReaction>(
            client
                .select(
                    POST_REACTIONS_TABLE,
                    &Query::new()
                        .eq("user_id", viewer)
                        .in_list("post_id", post_ids),
                )
                .await?,
        )?
        .into_iter()
        .map(|r| (r.post_id, r.kind))
        .collect(),
        None => HashMap::new(),
    };

    let mut items = Vec::with_capacity(posts.len());
    for post in posts {
        let on_post = Query::new().eq("post_id", post.id.as_str());
        let agreed = on_post.clone().eq("kind", ReactionKind::Agree.as_str());
        let disagreed = on_post.clone().eq("kind", ReactionKind::Disagree.as_str());
        let (comment_count, agree_count, disagree_count) = tokio::try_join!(
            client.count(COMMENTS_TABLE, &on_post),
            client.count(POST_REACTIONS_TABLE, &agreed),
            client.count(POST_REACTIONS_TABLE, &disagreed),
        )?;
        let author = authors.get(&post.user_id);

        items.push(FeedItem {
            author_name: author.map_or("Anonymous", UserProfile::name).to_string(),
            author_photo_url: author.and_then(|a| a.photo_url.clone()).filter(|u| !u.is_empty()),
            comment_count,
            agree_count,
            disagree_count,
            my_reaction: mine.get(&post.id).copied(),
            post,
        });
    }

    Ok(items)
}
