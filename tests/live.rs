use std::sync::Arc;
use std::time::Instant;

use wavelength::{comments, follow, posts, reactions, users};
use wavelength::{AuthManager, BackendConfig, Client, MemoryStorage};

const PASSWORD: &str = "password123";

fn live_client() -> Client {
    dotenvy::dotenv().ok();
    let config = BackendConfig::from_env().expect("WAVELENGTH_SUPABASE_URL and WAVELENGTH_SUPABASE_ANON_KEY must be set");
    Client::rest(config, Arc::new(MemoryStorage::new())).expect("client builds")
}

/// Runs against the project named in the environment. Accounts are created
/// with random emails and left behind.
#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn live_signup_post_react_follow() {
    let start = Instant::now();
    let tag = uuid::Uuid::new_v4().to_string()[0..8].to_string();

    println!("\n=== Live backend flow ===");

    let other = AuthManager::new(live_client());
    other.initialize().await;
    let other_user = other
        .signup(&format!("live_other_{}@example.com", tag), PASSWORD, "Other")
        .await
        .expect("second signup");
    other.logout().await.ok();

    let auth = AuthManager::new(live_client());
    auth.initialize().await;
    let user = auth
        .signup(&format!("live_{}@example.com", tag), PASSWORD, "Live")
        .await
        .expect("signup");
    println!("Signed up {} in {:.2}s", user.id, start.elapsed().as_secs_f64());
    assert!(auth.state().profile.is_some());

    let client = auth.client();
    let post = posts::create_post(client, &user.id, "hello from the live test").await.expect("post");
    assert!(reactions::agree_with_post(client, &user.id, &post.id).await);
    assert!(comments::add_comment(client, &user.id, &post.id, "first!", Some("Live"), None).await);

    let feed = posts::list_feed(client, Some(&user.id), 0).await.expect("feed");
    let item = feed.iter().find(|i| i.post.id == post.id).expect("own post in feed");
    assert_eq!(item.agree_count, 1);
    assert_eq!(item.comment_count, 1);

    assert!(follow::follow_user(client, &user.id, &other_user.id).await);
    let stats = users::profile_stats(client, &user.id).await.expect("stats");
    assert_eq!(stats.posts_count, 1);

    assert!(posts::delete_post(client, &post.id).await);
    auth.logout().await.expect("logout");
    assert!(auth.state().user.is_none());

    println!("Live flow done in {:.2}s", start.elapsed().as_secs_f64());
}
