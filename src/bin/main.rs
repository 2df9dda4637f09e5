use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wavelength::core::db::{init_demo_data, DEMO_PASSWORD};
use wavelength::handlers::{self, Alert};
use wavelength::models::models::{AuthUser, FeedItem, ProfileUpdate, ReactionKind};
use wavelength::{comments, config, follow, posts, reactions, users};
use wavelength::{AuthManager, BackendConfig, Client, FileStorage, MemoryBackend, MemoryStorage};

#[derive(Parser)]
#[command(name = "wavelength", about = "Wavelength social feed client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and its profile
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Show the signed-in user and profile
    Whoami,
    Feed {
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    Post { content: String },
    EditPost { post_id: String, content: String },
    DeletePost { post_id: String },
    Agree { post_id: String },
    Disagree { post_id: String },
    Unreact { post_id: String },
    Comment { post_id: String, text: String },
    Comments { post_id: String },
    Follow { user_id: String },
    Unfollow { user_id: String },
    /// Follow requests waiting for you
    Requests,
    Accept { request_id: String },
    Profile,
    EditProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Walk through the app against a seeded in-memory backend
    Demo,
}

fn alert(a: Alert) -> anyhow::Error {
    anyhow!("{}: {}", a.title, a.message)
}

fn signed_in(auth: &AuthManager) -> anyhow::Result<AuthUser> {
    auth.state()
        .user
        .ok_or_else(|| anyhow!("Not logged in. Run `wavelength login` first."))
}

fn ok_or_fail(done: bool, what: &str) -> anyhow::Result<()> {
    if done {
        println!("{}", what);
        Ok(())
    } else {
        bail!("Could not complete: {}", what)
    }
}

fn print_feed(items: &[FeedItem]) {
    if items.is_empty() {
        println!("No posts yet.");
    }
    for item in items {
        let mine = match item.my_reaction {
            Some(ReactionKind::Agree) => " (you agree)",
            Some(ReactionKind::Disagree) => " (you disagree)",
            None => "",
        };
        println!("[{}] {} · {}", item.post.id, item.author_name, item.post.created_at);
        println!("  {}", item.post.content);
        println!(
            "  👍 {}  👎 {}  💬 {}{}",
            item.agree_count, item.disagree_count, item.comment_count, mine
        );
    }
}

async fn run(auth: &AuthManager, command: Command) -> anyhow::Result<()> {
    let client = auth.client();

    match command {
        Command::Signup { email, password, name } => {
            let user = handlers::handle_signup(auth, &email, &password, &name).await.map_err(alert)?;
            println!("Signed up as {} ({})", name, user.id);
        }
        Command::Login { email, password } => {
            let user = handlers::handle_login(auth, &email, &password).await.map_err(alert)?;
            println!("Logged in as {}", user.email.unwrap_or(user.id));
        }
        Command::Logout => {
            handlers::handle_logout(auth).await.map_err(alert)?;
            println!("Logged out");
        }
        Command::Whoami => match auth.state().user {
            Some(user) => {
                let name = auth.state().profile.map(|p| p.name().to_string());
                println!("{} {}", user.id, name.unwrap_or_else(|| "(no profile)".to_string()));
            }
            None => println!("Not logged in"),
        },
        Command::Feed { page } => print_feed(&handlers::load_feed(auth, page).await),
        Command::Post { content } => {
            let post = handlers::handle_create_post(auth, &content).await.map_err(alert)?;
            println!("Post created! {}", post.id);
        }
        Command::EditPost { post_id, content } => {
            signed_in(auth)?;
            let post = posts::edit_post(client, &post_id, &content).await?;
            println!("Post updated at {}", post.updated_at.unwrap_or_default());
        }
        Command::DeletePost { post_id } => {
            signed_in(auth)?;
            ok_or_fail(posts::delete_post(client, &post_id).await, "post deleted")?;
        }
        Command::Agree { post_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(reactions::agree_with_post(client, &user.id, &post_id).await, "agreed")?;
        }
        Command::Disagree { post_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(reactions::disagree_with_post(client, &user.id, &post_id).await, "disagreed")?;
        }
        Command::Unreact { post_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(reactions::clear_reaction(client, &user.id, &post_id).await, "reaction removed")?;
        }
        Command::Comment { post_id, text } => {
            let user = signed_in(auth)?;
            let profile = auth.state().profile;
            let name = profile.as_ref().and_then(|p| p.display_name.clone());
            let photo = profile.as_ref().and_then(|p| p.photo_url.clone());
            let done = comments::add_comment(client, &user.id, &post_id, &text, name.as_deref(), photo.as_deref()).await;
            ok_or_fail(done, "comment added")?;
        }
        Command::Comments { post_id } => {
            for c in comments::list_comments(client, &post_id).await? {
                println!("{} · {}: {}", c.created_at, c.username, c.text);
            }
        }
        Command::Follow { user_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(follow::follow_user(client, &user.id, &user_id).await, "follow requested")?;
        }
        Command::Unfollow { user_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(follow::unfollow_user(client, &user.id, &user_id).await, "unfollowed")?;
        }
        Command::Requests => {
            let user = signed_in(auth)?;
            for r in follow::pending_follow_requests(client, &user.id).await? {
                println!("[{}] from {} at {}", r.id, r.from_user_id, r.created_at);
            }
        }
        Command::Accept { request_id } => {
            let user = signed_in(auth)?;
            ok_or_fail(
                follow::accept_follow_request(client, &request_id, &user.id).await,
                "follow request accepted",
            )?;
        }
        Command::Profile => match handlers::load_profile_view(client, &auth.state()).await {
            Some(view) => {
                println!("{}", view.profile.name());
                if let Some(email) = &view.profile.email {
                    println!("{}", email);
                }
                if let Some(bio) = view.profile.bio.as_deref().filter(|b| !b.is_empty()) {
                    println!("{}", bio);
                }
                println!(
                    "Posts {} · Followers {} · Following {}",
                    view.stats.posts_count, view.stats.followers_count, view.stats.following_count
                );
            }
            None => println!("Not logged in"),
        },
        Command::EditProfile { name, bio, photo_url } => {
            let user = signed_in(auth)?;
            let update = ProfileUpdate { display_name: name, bio, photo_url };
            let profile = users::update_profile(client, &user.id, update).await?;
            println!("Profile updated: {}", profile.name());
        }
        Command::Demo => bail!("demo cannot run inside another session"),
    }

    Ok(())
}

async fn demo() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let accounts = init_demo_data(backend.as_ref()).await?;
    let client = Client::new(backend.clone(), Arc::new(MemoryStorage::new()));
    let auth = AuthManager::new(client);
    let _subscription = auth.subscribe_to_auth_changes();
    auth.initialize().await;

    let email = accounts.test.email.clone().unwrap_or_default();
    run(&auth, Command::Login { email, password: DEMO_PASSWORD.to_string() }).await?;
    run(&auth, Command::Post { content: "Trying out the demo".to_string() }).await?;
    run(&auth, Command::Feed { page: 0 }).await?;
    run(&auth, Command::Follow { user_id: accounts.alice.id.clone() }).await?;
    run(&auth, Command::Profile).await?;
    run(&auth, Command::Logout).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    if let Command::Demo = cli.command {
        return demo().await;
    }

    let backend_config = BackendConfig::from_env().context("cannot start without backend settings")?;
    let storage = Arc::new(FileStorage::new(config::session_file()));
    let client = Client::rest(backend_config, storage)?;
    let auth = AuthManager::new(client);

    let subscription = auth.subscribe_to_auth_changes();
    auth.initialize().await;
    let result = run(&auth, cli.command).await;
    subscription.unsubscribe();
    result
}
