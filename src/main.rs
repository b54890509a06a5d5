mod config;
mod pages;
mod router;
mod supabase;

use std::io::{self, BufRead};
use std::sync::Arc;

use auth::guard::{DEFAULT_LOGIN_PATH, login_redirect_url};
use auth::login::{self, Credentials, LoginError, post_login_target};
use auth::{AuthContext, AuthProvider, GatewayError, ProfileUpdate, TracingObserver, use_auth};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{AtlasConfig, ConfigError};
use crate::router::{RouteError, TerminalRouter, Visit};
use crate::supabase::SupabaseClient;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Login(#[from] LoginError),
    #[error("{0}")]
    Route(#[from] RouteError),
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
    #[error("not signed in; run `atlas login`")]
    NotSignedIn,
}

#[derive(Parser, Debug)]
#[command(name = "atlas", about = "The Atlas mapping platform shell")]
struct Cli {
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a page, following redirects.
    Open {
        #[arg(default_value = "/")]
        path: String,
        /// Take the "Go to Dashboard" action when access is denied.
        #[arg(long, default_value_t = false)]
        escape: bool,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ATLAS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Page to open after signing in.
        #[arg(long)]
        redirect: Option<String>,
    },
    Logout,
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ATLAS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        company_id: Option<Uuid>,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    UpdatePassword {
        #[arg(long, env = "ATLAS_NEW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    UpdateProfile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        company_id: Option<Uuid>,
    },
    Whoami,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let config = match (cli.supabase_url, cli.anon_key) {
        (Some(url), Some(key)) => AtlasConfig::with_credentials(url, key)?,
        _ => AtlasConfig::from_env()?,
    };
    tracing::debug!(session_file = %config.session_file.display(), "config loaded");

    let client = Arc::new(SupabaseClient::new(&config)?);
    let provider = AuthProvider::new(client.clone(), client, config.admin_policy(), Arc::new(TracingObserver));

    let result = provider.scope(run(cli.command)).await;
    provider.shutdown().await;
    result
}

async fn run(command: Command) -> Result<(), CliError> {
    let auth = use_auth();
    match command {
        Command::Open { path, escape } => {
            let router = TerminalRouter::new(auth).escape_denied(escape);
            show(&router.open(&path).await?);
        }
        Command::Login { email, password, redirect } => sign_in(auth, email, password, redirect).await?,
        Command::Logout => show(&TerminalRouter::new(auth).open("/auth/logout").await?),
        Command::Signup { email, password, company_id } => {
            let password = password_or_prompt(password, "Password: ")?;
            let mut metadata = Map::new();
            if let Some(company_id) = company_id {
                metadata.insert("company_id".into(), Value::String(company_id.to_string()));
            }
            let outcome = login::sign_up(&**auth.gateway(), &Credentials::new(email, password), metadata).await?;
            if outcome.session.is_some() {
                println!("Account created and signed in.");
            } else {
                println!("Account created. Check your email to confirm it before signing in.");
            }
        }
        Command::ResetPassword { email } => {
            login::reset_password(&**auth.gateway(), &email).await?;
            println!("Check your email for a password reset link.");
        }
        Command::UpdatePassword { password } => {
            let password = password_or_prompt(password, "New password: ")?;
            login::update_password(&**auth.gateway(), &password).await?;
            println!("Password updated.");
        }
        Command::UpdateProfile { email, company_id } => {
            if !auth.ready().await.is_authenticated() {
                return Err(CliError::NotSignedIn);
            }
            auth.update_profile(&ProfileUpdate { email, company_id }).await?;
            whoami(&auth).await?;
        }
        Command::Whoami => whoami(&auth).await?,
    }
    Ok(())
}

async fn sign_in(
    auth: AuthContext,
    email: String,
    password: Option<String>,
    redirect: Option<String>,
) -> Result<(), CliError> {
    let router = TerminalRouter::new(auth.clone());
    if auth.ready().await.is_authenticated() {
        let login_path = redirect
            .as_deref()
            .map_or_else(|| DEFAULT_LOGIN_PATH.to_string(), |r| login_redirect_url(DEFAULT_LOGIN_PATH, r));
        show(&router.open(&login_path).await?);
        return Ok(());
    }

    let password = password_or_prompt(password, "Password: ")?;
    let session = match login::sign_in(&**auth.gateway(), &Credentials::new(email, password)).await {
        Ok(session) => session,
        Err(e) => {
            println!("{}", pages::login::form(redirect.as_deref(), Some(&e.form_errors())));
            return Err(e.into());
        }
    };

    // The store picks the new session up from the SIGNED_IN notification.
    let user_id = session.user.id;
    auth.wait_until(|s| s.user.as_ref().is_some_and(|u| u.id == user_id)).await;
    auth.refresh_profile().await;
    show(&router.open(&post_login_target(redirect.as_deref())).await?);
    Ok(())
}

async fn whoami(auth: &AuthContext) -> Result<(), CliError> {
    let snapshot = auth.ready().await;
    let Some(user) = snapshot.user.as_ref() else {
        return Err(CliError::NotSignedIn);
    };
    println!("{}", user.email.as_deref().unwrap_or("(no email)"));
    println!("id:      {}", user.id);
    println!(
        "company: {}",
        snapshot
            .profile
            .as_ref()
            .and_then(|p| p.company_name())
            .unwrap_or(pages::dashboard::NOT_ASSIGNED)
    );
    println!("role:    {}", pages::dashboard::role(snapshot.is_admin));
    Ok(())
}

fn show(visit: &Visit) {
    if visit.trail.len() > 1 {
        tracing::debug!(path = %visit.path, trail = ?visit.trail, "followed redirects");
    }
    println!("{}", visit.screen);
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String, CliError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("{label}");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
