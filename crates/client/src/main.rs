//! `assursuite` command-line client.
//!
//!   assursuite login --email awa@example.com --password ... --remember
//!   assursuite profile
//!   assursuite can --permission contracts.read

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use assursuite_auth::Authorizer;
use assursuite_client::{
    ClientConfig, CredentialStore, FileStore, MemoryStore, SessionClient, SessionState, TracingRedirect,
};

#[derive(Parser)]
#[command(name = "assursuite")]
#[command(about = "Sign in to the AssurSuite admin API and inspect the session", long_about = None)]
struct Cli {
    /// API base URL (overrides ASSURSUITE_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "ASSURSUITE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the session across restarts
        #[arg(long)]
        remember: bool,
    },

    /// End the session and wipe stored credentials
    Logout,

    /// Exchange the current token for a fresh one
    Refresh,

    /// Fetch and store the signed-in user's profile
    Profile,

    /// Show the stored session
    Status,

    /// Check a permission or role against the stored session
    Can {
        #[arg(long, conflicts_with = "role", required_unless_present = "role")]
        permission: Option<String>,

        #[arg(long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    assursuite_observability::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("invalid client configuration")?;
    if let Some(url) = &cli.api_url {
        let login_path = config.login_path.clone();
        let data_dir = config.data_dir.take();
        config = ClientConfig::new(url).context("invalid --api-url")?;
        config.login_path = login_path;
        config.data_dir = data_dir;
    }

    let durable = FileStore::open(config.credentials_path()?)?;
    tracing::debug!(path = %durable.path().display(), "using durable credential store");
    let credentials = Arc::new(CredentialStore::new(Arc::new(MemoryStore::new()), Arc::new(durable)));
    let client = Arc::new(SessionClient::new(config, credentials, Arc::new(TracingRedirect)));
    let session = SessionState::new(client);

    match cli.command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            session.login(&email, &password, remember).await.map_err(|err| {
                anyhow::anyhow!(session.error().unwrap_or_else(|| err.to_string()))
            })?;
            println!("Signed in as {}", session.user_full_name());
            if !remember {
                println!("Session was not remembered and ends with this process.");
            }
        }
        Command::Logout => {
            if let Err(err) = session.logout().await {
                tracing::warn!(error = %err, "remote logout failed");
            }
            println!("Signed out");
        }
        Command::Refresh => {
            session
                .refresh_token()
                .await
                .with_context(|| session.error().unwrap_or_default())?;
            println!("Token refreshed");
        }
        Command::Profile => {
            let profile = session
                .fetch_user()
                .await
                .with_context(|| session.error().unwrap_or_default())?;
            println!("{}", serde_json::to_string_pretty(&json!({
                "user": profile.user,
                "roles": profile.roles,
                "permissions": profile.permissions,
            }))?);
        }
        Command::Status => {
            let snapshot = session.snapshot();
            let mut roles: Vec<_> = snapshot.roles().map(|r| r.as_str()).collect();
            let mut permissions: Vec<_> = snapshot.permissions().map(|p| p.as_str()).collect();
            roles.sort_unstable();
            permissions.sort_unstable();
            println!("{}", serde_json::to_string_pretty(&json!({
                "authenticated": snapshot.is_authenticated(),
                "user": snapshot.user_full_name(),
                "roles": roles,
                "permissions": permissions,
            }))?);
        }
        Command::Can { permission, role } => {
            let allowed = match (&permission, &role) {
                (Some(p), _) => session.has_permission(p),
                (None, Some(r)) => session.has_role(r),
                (None, None) => bail!("pass --permission or --role"),
            };
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
