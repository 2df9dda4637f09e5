use serde::{Deserialize, Serialize};

use crate::core::helpers::now_unix;

// === Auth ===

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    /// Display name recorded in the auth metadata at signup, if any.
    pub fn metadata_display_name(&self) -> Option<&str> {
        self.user_metadata
            .get("display_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// A session without `expires_at` is treated as never expiring.
    pub fn is_expired(&self, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => now_unix() + margin_secs >= at,
            None => false,
        }
    }

    /// Fill `expires_at` from `expires_in` when the backend only sent the latter.
    pub fn with_expiry(mut self) -> Self {
        if self.expires_at.is_none() {
            if let Some(secs) = self.expires_in {
                self.expires_at = Some(now_unix() + secs);
            }
        }
        self
    }
}

/// Result of a sign-up: the session is absent when the backend requires
/// email confirmation before the first sign-in.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }
}

// === Rows ===

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserProfile {
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Anonymous")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProfileStats {
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Agree,
    Disagree,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Agree => "agree",
            ReactionKind::Disagree => "disagree",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PostReaction {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub kind: ReactionKind,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub user_avatar: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FollowRequest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: String,
}

/// Post joined with what the feed shows next to it.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FeedItem {
    pub post: Post,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub comment_count: u64,
    pub agree_count: u64,
    pub disagree_count: u64,
    pub my_reaction: Option<ReactionKind>,
}
