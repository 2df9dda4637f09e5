mod common;

use std::sync::Arc;

use common::*;
use wavelength::config::*;
use wavelength::core::db::init_demo_data;
use wavelength::models::models::{ProfileUpdate, ReactionKind};
use wavelength::{comments, follow, posts, reactions, users};
use wavelength::{ApiError, Client, MemoryBackend};

fn setup() -> (Client, Arc<MemoryBackend>) {
    Client::in_memory()
}

#[tokio::test]
async fn test_follow_self_is_rejected_without_backend_call() {
    let (client, backend) = setup();

    assert!(!follow::follow_user(&client, "ann", "ann").await);
    assert!(!follow::unfollow_user(&client, "ann", "ann").await);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_follow_twice_is_idempotent() {
    let (client, backend) = setup();

    assert!(follow::follow_user(&client, "ann", "bob").await);
    assert!(follow::follow_user(&client, "ann", "bob").await);

    assert_eq!(backend.rows(FOLLOW_REQUESTS_TABLE).len(), 1);
    assert_eq!(backend.call_count("insert", FOLLOW_REQUESTS_TABLE), 1);
}

#[tokio::test]
async fn test_follow_backend_failure_returns_false() {
    let (client, backend) = setup();
    backend.fail_next("insert", FOLLOW_REQUESTS_TABLE, ApiError::Forbidden);

    assert!(!follow::follow_user(&client, "ann", "bob").await);
    assert!(backend.rows(FOLLOW_REQUESTS_TABLE).is_empty());
}

#[tokio::test]
async fn test_accept_and_unfollow_touch_single_edges() {
    let (client, _backend) = setup();
    for target in ["bob", "cat"] {
        assert!(follow::follow_user(&client, "ann", target).await);
        let pending = follow::pending_follow_requests(&client, target).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(follow::accept_follow_request(&client, &pending[0].id, target).await);
    }
    assert!(follow::follow_user(&client, "dan", "bob").await);
    let dan_request = follow::pending_follow_requests(&client, "bob").await.unwrap();
    assert!(follow::accept_follow_request(&client, &dan_request[0].id, "bob").await);

    assert!(follow::unfollow_user(&client, "ann", "bob").await);

    assert_eq!(follow::get_followings(&client, "ann").await.unwrap(), vec!["cat".to_string()]);
    assert_eq!(follow::get_followers(&client, "bob").await.unwrap(), vec!["dan".to_string()]);
    assert_eq!(follow::get_followers(&client, "cat").await.unwrap(), vec!["ann".to_string()]);
}

#[tokio::test]
async fn test_only_target_can_accept_request() {
    let (client, backend) = setup();
    assert!(follow::follow_user(&client, "ann", "bob").await);
    let request = follow::pending_follow_requests(&client, "bob").await.unwrap().remove(0);

    assert!(!follow::accept_follow_request(&client, &request.id, "ann").await);
    assert!(backend.rows(FOLLOWS_TABLE).is_empty());
    assert_eq!(backend.rows(FOLLOW_REQUESTS_TABLE).len(), 1);
}

#[tokio::test]
async fn test_post_content_validation() {
    let (client, backend) = setup();

    let empty = posts::create_post(&client, "ann", "   ").await.unwrap_err();
    assert_eq!(empty, ApiError::Validation("Please write something".to_string()));

    let long = posts::create_post(&client, "ann", &"a".repeat(MAX_POST_LENGTH + 1)).await;
    assert!(matches!(long, Err(ApiError::Validation(_))));
    assert!(backend.calls().is_empty());

    let post = posts::create_post(&client, "ann", "  hello world  ").await.unwrap();
    assert_eq!(post.content, "hello world");
    assert_eq!(post.user_id, "ann");
}

#[tokio::test]
async fn test_edit_post_sets_updated_at() {
    let (client, _backend) = setup();
    let post = posts::create_post(&client, "ann", "first draft").await.unwrap();

    let edited = posts::edit_post(&client, &post.id, "second draft").await.unwrap();

    assert_eq!(edited.content, "second draft");
    assert!(edited.updated_at.is_some());
    let missing = posts::edit_post(&client, "no-such-post", "text").await;
    assert!(matches!(missing, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_post() {
    let (client, backend) = setup();
    let post = posts::create_post(&client, "ann", "short lived").await.unwrap();

    assert!(!posts::delete_post(&client, "no-such-post").await);
    assert!(posts::delete_post(&client, &post.id).await);
    assert!(backend.rows(POSTS_TABLE).is_empty());

    backend.fail_next("delete", POSTS_TABLE, ApiError::Network("offline".to_string()));
    assert!(!posts::delete_post(&client, "anything").await);
}

#[tokio::test]
async fn test_blank_comment_is_not_inserted() {
    let (client, backend) = setup();

    assert!(!comments::add_comment(&client, "ann", "post-1", " \n\t ", None, None).await);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_comment_defaults_and_trimming() {
    let (client, _backend) = setup();

    assert!(comments::add_comment(&client, "ann", "post-1", "  nice post ", None, None).await);
    assert!(comments::add_comment(&client, "bob", "post-1", "agreed", Some("Bob"), Some("https://img/bob.png")).await);

    let listed = comments::list_comments(&client, "post-1").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].text, "nice post");
    assert_eq!(listed[0].username, "User");
    assert_eq!(listed[0].user_avatar, "");
    assert_eq!(listed[1].username, "Bob");
}

#[tokio::test]
async fn test_reactions_replace_only_own_row() {
    let (client, backend) = setup();
    let ann = register(&backend, "ann").await;
    let post = posts::create_post(&client, &ann.id, "agree or not?").await.unwrap();

    assert!(reactions::agree_with_post(&client, "ann", &post.id).await);
    assert!(reactions::agree_with_post(&client, "bob", &post.id).await);
    assert!(reactions::disagree_with_post(&client, "ann", &post.id).await);

    assert_eq!(backend.rows(POST_REACTIONS_TABLE).len(), 2);
    let feed = posts::list_feed(&client, Some("ann"), 0).await.unwrap();
    assert_eq!(feed[0].agree_count, 1);
    assert_eq!(feed[0].disagree_count, 1);
    assert_eq!(feed[0].my_reaction, Some(ReactionKind::Disagree));

    assert!(reactions::clear_reaction(&client, "ann", &post.id).await);
    let feed = posts::list_feed(&client, Some("ann"), 0).await.unwrap();
    assert_eq!(feed[0].my_reaction, None);
    assert_eq!(feed[0].agree_count, 1);
}

#[tokio::test]
async fn test_feed_is_newest_first_with_authors_and_counts() {
    let (client, backend) = setup();
    let ann = register(&backend, "ann").await;
    let bob = register(&backend, "bob").await;
    let first = posts::create_post(&client, &ann.id, "first").await.unwrap();
    let second = posts::create_post(&client, &bob.id, "second").await.unwrap();
    assert!(comments::add_comment(&client, &bob.id, &first.id, "reply", Some("bob"), None).await);

    let feed = posts::list_feed(&client, None, 0).await.unwrap();

    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].post.id, second.id);
    assert_eq!(feed[0].author_name, "bob");
    assert_eq!(feed[1].author_name, "ann");
    assert_eq!(feed[1].comment_count, 1);
    assert_eq!(feed[0].comment_count, 0);
    assert!(posts::list_feed(&client, None, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_profile_stats_and_edit() {
    let (client, backend) = setup();
    let ann = register(&backend, "ann").await;
    posts::create_post(&client, &ann.id, "one").await.unwrap();
    posts::create_post(&client, &ann.id, "two").await.unwrap();
    assert!(follow::follow_user(&client, "bob", &ann.id).await);
    let request = follow::pending_follow_requests(&client, &ann.id).await.unwrap().remove(0);
    assert!(follow::accept_follow_request(&client, &request.id, &ann.id).await);

    let stats = users::profile_stats(&client, &ann.id).await.unwrap();
    assert_eq!(stats.posts_count, 2);
    assert_eq!(stats.followers_count, 1);
    assert_eq!(stats.following_count, 0);

    let too_long = ProfileUpdate { bio: Some("x".repeat(MAX_BIO_LENGTH + 1)), ..Default::default() };
    assert!(matches!(
        users::update_profile(&client, &ann.id, too_long).await,
        Err(ApiError::Validation(_))
    ));

    let update = ProfileUpdate { bio: Some("  hi there ".to_string()), ..Default::default() };
    let profile = users::update_profile(&client, &ann.id, update).await.unwrap();
    assert_eq!(profile.bio.as_deref(), Some("hi there"));
    assert_eq!(profile.display_name.as_deref(), Some("ann"));
}

#[tokio::test]
async fn test_load_profile_swallows_errors() {
    let (client, backend) = setup();
    let ann = register(&backend, "ann").await;
    backend.fail_next("select", USERS_TABLE, ApiError::Network("offline".to_string()));

    assert!(users::load_profile(&client, &ann.id).await.is_none());
    assert!(users::load_profile(&client, &ann.id).await.is_some());
    assert!(users::load_profile(&client, "nobody").await.is_none());
}

#[tokio::test]
async fn test_demo_data_is_seeded_once() {
    let (_client, backend) = setup();

    let first = init_demo_data(backend.as_ref()).await.unwrap();
    let second = init_demo_data(backend.as_ref()).await.unwrap();

    assert_eq!(first.bob.id, second.bob.id);
    assert_eq!(backend.rows(USERS_TABLE).len(), 3);
    assert_eq!(backend.rows(POSTS_TABLE).len(), 4);
    assert_eq!(backend.rows(FOLLOWS_TABLE).len(), 1);
}

#[tokio::test]
async fn test_user_posts_are_paged_newest_first() {
    let (client, _backend) = setup();
    for i in 0..(POSTS_PER_PAGE + 2) {
        posts::create_post(&client, "ann", &format!("post {}", i)).await.unwrap();
    }
    posts::create_post(&client, "bob", "not ann's").await.unwrap();

    let first_page = posts::list_user_posts(&client, "ann", 0).await.unwrap();
    let second_page = posts::list_user_posts(&client, "ann", 1).await.unwrap();

    assert_eq!(first_page.len(), POSTS_PER_PAGE);
    assert_eq!(second_page.len(), 2);
    assert_eq!(first_page[0].content, format!("post {}", POSTS_PER_PAGE + 1));
    let fetched = posts::get_post(&client, &second_page[1].id).await.unwrap();
    assert_eq!(fetched.content, "post 0");
    assert!(matches!(posts::get_post(&client, "missing").await, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_reaction_switch_keeps_previous_reaction() {
    let (client, backend) = setup();
    let post = posts::create_post(&client, "ann", "agree or not?").await.unwrap();
    assert!(reactions::agree_with_post(&client, "ann", &post.id).await);
    backend.clear_calls();

    backend.fail_next("update", POST_REACTIONS_TABLE, ApiError::Network("offline".to_string()));
    assert!(!reactions::disagree_with_post(&client, "ann", &post.id).await);

    let feed = posts::list_feed(&client, Some("ann"), 0).await.unwrap();
    assert_eq!(feed[0].my_reaction, Some(ReactionKind::Agree));
    assert_eq!(feed[0].agree_count, 1);

    backend.fail_next("insert", POST_REACTIONS_TABLE, ApiError::Network("offline".to_string()));
    assert!(reactions::disagree_with_post(&client, "ann", &post.id).await);

    let feed = posts::list_feed(&client, Some("ann"), 0).await.unwrap();
    assert_eq!(feed[0].my_reaction, Some(ReactionKind::Disagree));
    assert_eq!(feed[0].agree_count, 0);
    assert_eq!(backend.rows(POST_REACTIONS_TABLE).len(), 1);
    assert_eq!(backend.call_count("delete", POST_REACTIONS_TABLE), 0);
}

#[tokio::test]
async fn test_follow_request_created_concurrently_counts_as_success() {
    let (client, backend) = setup();
    backend.fail_next(
        "insert",
        FOLLOW_REQUESTS_TABLE,
        ApiError::Conflict("duplicate key value violates unique constraint".to_string()),
    );

    assert!(follow::follow_user(&client, "ann", "bob").await);
}

#[tokio::test]
async fn test_feed_counts_come_from_row_counts() {
    let (client, backend) = setup();
    let post = posts::create_post(&client, "ann", "popular").await.unwrap();
    for i in 0..30 {
        let user = format!("user-{}", i);
        assert!(reactions::react_to_post(
            &client,
            &user,
            &post.id,
            if i % 3 == 0 { ReactionKind::Disagree } else { ReactionKind::Agree },
        )
        .await);
        assert!(comments::add_comment(&client, &user, &post.id, "+1", None, None).await);
    }
    backend.clear_calls();

    let feed = posts::list_feed(&client, Some("user-0"), 0).await.unwrap();

    assert_eq!(feed[0].comment_count, 30);
    assert_eq!(feed[0].agree_count, 20);
    assert_eq!(feed[0].disagree_count, 10);
    assert_eq!(feed[0].my_reaction, Some(ReactionKind::Disagree));
    assert_eq!(backend.call_count("select", COMMENTS_TABLE), 0);
    assert_eq!(backend.call_count("count", COMMENTS_TABLE), 1);
}

#[tokio::test]
async fn test_feed_page_past_the_end_is_empty() {
    let (client, _backend) = setup();
    posts::create_post(&client, "ann", "only post").await.unwrap();

    assert!(posts::list_feed(&client, None, usize::MAX / 2).await.unwrap().is_empty());
}
