//! Screen actions: what the view layer calls when a form is submitted.
//!
//! Each handler validates its form before touching the backend and turns any
//! failure into an [`Alert`] the screen shows as-is.

use crate::auth::{validate_signup, AuthManager, AuthPhase, AuthState};
use crate::client::Client;
use crate::core::errors::ApiError;
use crate::core::helpers::is_blank;
use crate::models::models::{AuthUser, FeedItem, Post, ProfileStats, UserProfile};
use crate::{posts, users};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: &str, message: impl Into<String>) -> Self {
        Self { title: title.to_string(), message: message.into() }
    }

    fn from_error(title: &str, err: &ApiError) -> Self {
        Self::new(title, err.user_message())
    }
}

/// Top-level navigation target for the current auth state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Nothing is rendered until the stored session has been checked.
    Splash,
    /// Login and signup screens.
    AuthStack,
    /// Feed, create and profile tabs.
    AppTabs,
}

pub fn route_for(state: &AuthState) -> Route {
    match state.phase() {
        AuthPhase::Loading => Route::Splash,
        AuthPhase::Unauthenticated => Route::AuthStack,
        AuthPhase::Authenticated => Route::AppTabs,
    }
}

pub async fn handle_signup(
    auth: &AuthManager,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<AuthUser, Alert> {
    if let Err(e) = validate_signup(email, password, display_name) {
        return Err(Alert::from_error("Error", &e));
    }
    auth.signup(email, password, display_name)
        .await
        .map_err(|e| Alert::from_error("Signup Error", &e))
}

pub async fn handle_login(auth: &AuthManager, email: &str, password: &str) -> Result<AuthUser, Alert> {
    if is_blank(email) || password.is_empty() {
        return Err(Alert::new("Error", "Please fill in all fields"));
    }
    auth.login(email, password)
        .await
        .map_err(|e| Alert::from_error("Login Error", &e))
}

pub async fn handle_logout(auth: &AuthManager) -> Result<(), Alert> {
    auth.logout().await.map_err(|e| Alert::from_error("Error", &e))
}

pub async fn handle_create_post(auth: &AuthManager, content: &str) -> Result<Post, Alert> {
    if is_blank(content) {
        return Err(Alert::new("Error", "Please write something"));
    }
    let user = auth
        .state()
        .user
        .ok_or_else(|| Alert::new("Error", "You need to be logged in to post"))?;
    posts::create_post(auth.client(), &user.id, content)
        .await
        .map_err(|e| Alert::from_error("Error", &e))
}

/// Feed page for the signed-in viewer. Failures leave the feed empty.
pub async fn load_feed(auth: &AuthManager, page: usize) -> Vec<FeedItem> {
    let viewer = auth.state().user.map(|u| u.id);
    match posts::list_feed(auth.client(), viewer.as_deref(), page).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(error = %e, "error fetching posts");
            Vec::new()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProfileView {
    pub profile: UserProfile,
    pub stats: ProfileStats,
}

/// Profile screen data, or `None` while there is no user or profile to show.
/// Stats that fail to load are shown as zero.
pub async fn load_profile_view(client: &Client, state: &AuthState) -> Option<ProfileView> {
    let (user, profile) = match (&state.user, &state.profile) {
        (Some(user), Some(profile)) => (user, profile.clone()),
        _ => return None,
    };
    let stats = users::profile_stats(client, &user.id).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "error fetching stats");
        ProfileStats::default()
    });
    Some(ProfileView { profile, stats })
}
