//! CLI operator tool for shortlink-coordinator.
//!
//! Runs the same coordination paths as the worker (resolution, admission,
//! click counting and flushing) against the configured stores, without
//! requiring a running process.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a short code through the cache
//! cargo run --bin admin -- resolve _Q
//!
//! # Spend one unit of a rate limit window
//! cargo run --bin admin -- admit redirect _Q
//!
//! # Count a click and flush its bucket
//! cargo run --bin admin -- click _Q
//! cargo run --bin admin -- flush --yes
//!
//! # Create a short link
//! cargo run --bin admin -- shorten https://example.com --code promo
//!
//! # Check database and coordination store connections
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string
//! - `REDIS_URL` (optional): coordination store; in-process when unset
//!
//! # Features
//!
//! - **Coordination**: Resolve, admit, click, flush and list buckets
//! - **Links**: Create short links and read persisted click history
//! - **Database Tools**: Connection checks and info queries
//! - **Interactive Prompts**: Confirmation before flushing
//! - **Colored Output**: Terminal-friendly formatting using `colored` crate

use shortlink_coordinator::application::services::{CreateLinkRequest, RateLimitPolicy};
use shortlink_coordinator::config::{self, Config};
use shortlink_coordinator::infrastructure::coordination::CoordinationStore;
use shortlink_coordinator::server::{connect_pool, connect_store};
use shortlink_coordinator::state::AppState;
use shortlink_coordinator::telemetry;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dialoguer::{Confirm, Input};

/// CLI tool for operating shortlink-coordinator.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
enum Commands {
    /// Resolve a short code to its long URL
    Resolve {
        /// Encoded id (`_Q`) or custom alias
        code: String,
    },

    /// Spend one unit of a rate limit window
    Admit {
        /// Which limiter to consult
        #[arg(value_enum)]
        limiter: LimiterKind,

        /// Short code (redirect) or principal id (creation)
        subject: String,
    },

    /// Count a click into its time bucket
    Click {
        code: String,

        /// Click time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Flush a bucket to the database
    Flush {
        /// Bucket key; defaults to the most recently closed bucket
        key: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List buckets waiting in the coordination store
    Buckets,

    /// Create a short link
    Shorten {
        long_url: String,

        /// Custom alias
        #[arg(short, long)]
        code: Option<String>,

        /// Lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,

        /// Owning principal; also the creation rate limit subject
        #[arg(long)]
        owner: Option<i64>,
    },

    /// Show persisted click history of a short code
    History {
        code: String,

        /// Range start (RFC 3339), defaults to 24 hours ago
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Range end (RFC 3339), defaults to now
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LimiterKind {
    Redirect,
    Creation,
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database and coordination store connections
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;
    telemetry::init_tracing("warn", &config.log_format);

    let pool = connect_pool(&config).await?;
    let store = connect_store(&config).await?;
    let (state, _click_rx) = AppState::build(&config, pool, store)?;

    match cli.command {
        Commands::Resolve { code } => resolve(&state, &code).await?,
        Commands::Admit { limiter, subject } => admit(&state, limiter, &subject).await?,
        Commands::Click { code, at } => click(&state, &code, at).await?,
        Commands::Flush { key, yes } => flush(&state, key, yes).await?,
        Commands::Buckets => list_buckets(&state).await?,
        Commands::Shorten {
            long_url,
            code,
            expires_in,
            owner,
        } => shorten(&state, &config, long_url, code, expires_in, owner).await?,
        Commands::History { code, from, to } => history(&state, &code, from, to).await?,
        Commands::Db { action } => handle_db_action(action, &state).await?,
    }

    Ok(())
}

async fn resolve(state: &AppState, code: &str) -> Result<()> {
    println!("{}", "🔎 Resolve".bright_blue().bold());
    println!();

    match state.resolver.resolve(code).await {
        Ok(long_url) => {
            println!("  {} -> {}", code.cyan(), long_url.bright_green());
        }
        Err(e) if e.is_not_found() => {
            println!("  {} {}", code.cyan(), "not found".yellow());
        }
        Err(e) => return Err(anyhow::anyhow!("Resolve failed: {}", e)),
    }
    println!();

    Ok(())
}

async fn admit(state: &AppState, kind: LimiterKind, subject: &str) -> Result<()> {
    let limiter = match kind {
        LimiterKind::Redirect => &state.admission.redirect,
        LimiterKind::Creation => &state.admission.creation,
    };
    print_policy(limiter.policy());

    if limiter.admit(subject).await {
        println!("  {} {}", subject.cyan(), "ADMITTED".green().bold());
    } else {
        println!("  {} {}", subject.cyan(), "REJECTED".red().bold());
    }
    println!();

    Ok(())
}

fn print_policy(policy: &RateLimitPolicy) {
    println!(
        "{}",
        format!("🚦 Rate limit: {}", policy.name).bright_blue().bold()
    );
    println!(
        "  Window: {}s, capacity: {}",
        policy.window_seconds.to_string().bright_white(),
        policy.capacity.to_string().bright_white()
    );
    println!();
}

async fn click(state: &AppState, code: &str, at: Option<DateTime<Utc>>) -> Result<()> {
    let at = at.unwrap_or_else(Utc::now);
    let count = state
        .aggregator
        .increment(code, at)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count click: {}", e))?;

    println!(
        "  {} in {} now at {}",
        code.cyan(),
        state.aggregator.format().key_for(at).bright_black(),
        count.to_string().bright_green().bold()
    );

    Ok(())
}

/// Flushes one bucket after confirmation.
///
/// Without a key this is the bucket the scheduler would flush on its next
/// tick.
async fn flush(state: &AppState, key: Option<String>, skip_confirm: bool) -> Result<()> {
    println!("{}", "🧹 Flush bucket".bright_blue().bold());
    println!();

    let key = match key {
        Some(k) => k,
        None => Input::new()
            .with_prompt("Bucket key")
            .with_initial_text(state.aggregator.due_bucket_key(Utc::now()))
            .interact_text()?,
    };

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt(format!("Flush {} to the database?", key))
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let report = state
        .aggregator
        .flush(&key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to flush {}: {}", key, e))?;

    println!();
    if report.is_noop() {
        println!("{}", "  Nothing to flush".yellow());
    } else {
        println!("{}", "✅ Bucket flushed".green().bold());
        println!("  Bucket:    {}", report.bucket_time.to_rfc3339().bright_white());
        println!("  Entries:   {}", report.entries);
        println!("  Persisted: {}", report.persisted.to_string().bright_green());
        println!("  Skipped:   {}", report.skipped.to_string().yellow());
        println!("  Clicks:    {}", report.clicks_persisted.to_string().bright_green().bold());
    }
    println!();

    Ok(())
}

async fn list_buckets(state: &AppState) -> Result<()> {
    println!("{}", "🪣 Pending buckets".bright_blue().bold());
    println!();

    let mut keys = state
        .aggregator
        .pending_buckets()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list buckets: {}", e))?;
    keys.sort();

    if keys.is_empty() {
        println!("{}", "  No buckets pending".yellow());
    }
    for key in &keys {
        println!("  {}", key.cyan());
    }

    println!();
    println!("  Total: {}", keys.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

async fn shorten(
    state: &AppState,
    config: &Config,
    long_url: String,
    custom_code: Option<String>,
    expires_in: Option<i64>,
    owner_id: Option<i64>,
) -> Result<()> {
    println!("{}", "🔗 Shorten".bright_blue().bold());
    println!();

    if let Some(owner) = owner_id {
        state
            .admission
            .creation
            .check(&owner.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    let expires_at = expires_in.map(|secs| Utc::now() + Duration::seconds(secs));

    let link = state
        .links
        .create_short_link(CreateLinkRequest {
            long_url,
            custom_code,
            expires_at,
            owner_id,
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create link: {}", e))?;

    println!("{}", "✅ Short link created".green().bold());
    println!("  Code:  {}", link.code.cyan());
    println!("  Short: {}", link.short_url.bright_yellow().bold());
    println!("  Long:  {}", link.record.long_url.bright_white());
    if let Some(expires_at) = link.record.expires_at {
        println!("  Expires: {}", expires_at.to_rfc3339().bright_black());
    }
    println!();
    println!(
        "  Base URL: {}",
        config.base_url.bright_black()
    );
    println!();

    Ok(())
}

/// Displays persisted click counts of a short code.
///
/// # Output Format
///
/// ```text
/// 📈 Click history: _Q
///
///   Bucket                     Clicks
///   ─────────────────────────────────
///   2024-03-05T09:00:00+00:00  3
/// ```
async fn history(
    state: &AppState,
    code: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let to = to.unwrap_or_else(Utc::now);
    let from = from.unwrap_or(to - Duration::hours(24));

    println!(
        "{}",
        format!("📈 Click history: {}", code).bright_blue().bold()
    );
    println!();

    let history = state
        .analytics
        .click_history(code, from, to)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load history: {}", e))?;

    if history.points.is_empty() {
        println!("{}", "  No flushed clicks in range".yellow());
        println!();
        return Ok(());
    }

    println!(
        "  {:<26} {}",
        "Bucket".bright_white().bold(),
        "Clicks".bright_white().bold()
    );
    println!("  {}", "─".repeat(33).bright_black());

    for point in &history.points {
        println!(
            "  {:<26} {}",
            point.time.to_rfc3339().bright_black(),
            point.count.to_string().bright_green()
        );
    }

    println!();
    println!(
        "  Total: {}",
        history.total.to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, state: &AppState) -> Result<()> {
    let pool: &sqlx::PgPool = &state.pool;
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1")
                .fetch_one(pool)
                .await
                .context("Database check failed")?;

            println!("{}", "✅ Database connection OK".green().bold());

            println!("{}", "🔍 Checking coordination store...".bright_blue());
            if !state.store.ping().await {
                anyhow::bail!("Coordination store check failed");
            }
            println!("{}", "✅ Coordination store OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_url")
                .fetch_one(pool)
                .await?;

            let aliases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM custom_url_code")
                .fetch_one(pool)
                .await?;

            let clicks: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(count), 0)::BIGINT FROM short_url_click_analytics",
            )
            .fetch_one(pool)
            .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Links:      {}", links.to_string().bright_green().bold());
            println!("  Aliases:    {}", aliases.to_string().bright_green().bold());
            println!("  Clicks:     {}", clicks.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}
