use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_core::model::{ChapterId, UserId};
use services::{AppServices, BackendConfig, Clock, InMemoryIdentity};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod player;

/// Command-line client for the course platform
#[derive(Parser, Debug)]
#[command(name = "course")]
#[command(about = "Browse chapters, watch videos and track progress")]
#[command(version)]
struct Cli {
    /// Backend base URL (falls back to COURSE_BACKEND_URL)
    #[arg(long)]
    backend_url: Option<String>,

    /// Public project key (falls back to COURSE_BACKEND_ANON_KEY)
    #[arg(long)]
    anon_key: Option<String>,

    /// Use a local SQLite mirror instead of the hosted backend
    #[arg(long = "db", env = "COURSE_DB_URL")]
    db_url: Option<String>,

    /// Signed-in user for offline runs against --db
    #[arg(long, env = "COURSE_DEV_USER", requires = "db_url")]
    dev_user: Option<UserId>,

    /// Account email
    #[arg(long, env = "COURSE_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "COURSE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all chapters
    Chapters,
    /// Show a chapter and its videos
    Chapter { id: ChapterId },
    /// Open a video page
    Video { chapter: String, video: String },
    /// Show the video that follows the given one
    Next { chapter: String, video: String },
    /// Recently watched videos
    History {
        #[arg(long, default_value_t = services::history_service::DASHBOARD_LIMIT)]
        limit: u32,
    },
    /// Show or change the username
    Profile {
        #[arg(long)]
        set_username: Option<String>,
    },
    /// Simulate a playback session and record progress
    Watch {
        chapter: String,
        video: String,
        /// Media length in seconds
        #[arg(long)]
        duration: f64,
        /// Played-seconds values reported by the player, in order
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        ticks: Vec<f64>,
    },
    /// Create an account with --email/--password
    Register,
    /// Email a password reset link
    ResetRequest { email: String },
    /// Set a new password from a reset link
    ResetPassword {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
}

impl Command {
    fn wants_session(&self) -> bool {
        !matches!(
            self,
            Command::Register | Command::ResetRequest { .. } | Command::ResetPassword { .. }
        )
    }
}

async fn build_services(cli: &Cli) -> Result<AppServices> {
    let clock = Clock::System;
    if let Some(db_url) = &cli.db_url {
        let identity = match cli.dev_user {
            Some(user_id) => InMemoryIdentity::signed_in_as(user_id),
            None => InMemoryIdentity::new(),
        };
        info!(db_url, "using local mirror");
        return AppServices::new_sqlite(db_url, Arc::new(identity), clock)
            .await
            .context("Failed to open local mirror");
    }

    let config = match (&cli.backend_url, &cli.anon_key) {
        (Some(url), Some(key)) => BackendConfig::new(url, key),
        _ => BackendConfig::from_env(),
    }
    .context("Backend is not configured")?;
    debug!(?config, "using hosted backend");
    Ok(AppServices::remote(&config, clock))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let app = build_services(&cli).await?;

    if let (true, Some(email), Some(password)) =
        (cli.command.wants_session(), &cli.email, &cli.password)
    {
        if let Err(err) = app.accounts().sign_in(email, password).await {
            eprintln!("Sign-in failed: {err}");
        }
    }
    if cli.command.wants_session() {
        match app.accounts().current_session().await {
            Ok(Some(session)) => debug!(user_id = %session.user_id(), "session active"),
            Ok(None) => debug!("no active session"),
            Err(err) => eprintln!("Your session has ended, please sign in again: {err}"),
        }
    }

    commands::run(&app, &cli, &cli.command).await;
    Ok(())
}
