use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use whackamole::config::Config;
use whackamole::feed::build_client;
use whackamole::ingest::{BatchReport, IngestSummary, Ingestor};
use whackamole::storage::{Article, Database, DatabaseError};

/// Get the config directory path (~/.config/whackamole/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("whackamole"))
}

#[derive(Parser, Debug)]
#[command(name = "whackamole", version, about = "Self-hosted RSS/Atom feed aggregator")]
struct Args {
    /// Config file (default: ~/.config/whackamole/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed; its current entries are stored as read
    Add { url: String },
    /// Unsubscribe from a feed and delete its articles
    Remove { feed_id: i64 },
    /// List subscribed feeds
    Feeds {
        #[arg(long)]
        json: bool,
    },
    /// List unread articles, newest first
    Unread {
        #[arg(long)]
        json: bool,
    },
    /// List the most recent articles regardless of read state
    Archive {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Mark one article as read
    Read { article_id: i64 },
    /// Mark every article as read
    ReadAll,
    /// Fetch every feed once
    Refresh,
    /// Re-fetch every feed and overwrite stored publication dates
    RefreshDates,
    /// Refresh now and then on the configured interval until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("whackamole=info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");

        // User-only access: the database holds the subscription list
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
            {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to set config directory permissions to 0700"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The database is locked by another process. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let client = build_client(&config.user_agent, config.fetch_timeout())
        .context("Failed to create HTTP client")?;
    let ingestor = Ingestor::new(db, client, config.ingest_options());

    run(args.command, &ingestor, &config).await
}

async fn run(command: Command, ingestor: &Ingestor, config: &Config) -> Result<()> {
    match command {
        Command::Add { url } => match ingestor.add_feed(&url).await {
            Ok(feed_id) => println!("{feed_id}"),
            Err(e) if e.is_duplicate() => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
            Err(e) => return Err(e).context("Failed to add feed"),
        },
        Command::Remove { feed_id } => {
            let removed = ingestor.delete_feed(feed_id).await?;
            println!("Removed feed {feed_id} ({removed} articles)");
        }
        Command::Feeds { json } => {
            let feeds = ingestor.list_feeds().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&feeds)?);
            } else {
                for feed in &feeds {
                    println!(
                        "{:>5}  {}  <{}>",
                        feed.id,
                        feed.title.as_deref().unwrap_or("(untitled)"),
                        feed.url
                    );
                }
            }
        }
        Command::Unread { json } => {
            print_articles(&ingestor.list_unread().await?, json)?;
        }
        Command::Archive { limit, json } => {
            let limit = limit.unwrap_or(config.archive_limit);
            print_articles(&ingestor.list_all(limit).await?, json)?;
        }
        Command::Read { article_id } => {
            if !ingestor.mark_read(article_id).await? {
                eprintln!("Article {article_id} not found or already read");
            }
        }
        Command::ReadAll => {
            let count = ingestor.mark_all_read().await?;
            println!("Marked {count} articles as read");
        }
        Command::Refresh => {
            let report = ingestor.run_batch().await?;
            print_batch(&report);
        }
        Command::RefreshDates => {
            let report = ingestor.refresh_all_dates().await?;
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(updated) => println!("{:>5}  updated {updated}", outcome.feed_id),
                    Err(e) => println!("{:>5}  failed: {e}", outcome.feed_id),
                }
            }
            println!("{} dates updated", report.total_updated());
        }
        Command::Watch => watch(ingestor, config).await?,
    }
    Ok(())
}

/// Scheduler loop: a batch in progress always runs to completion before
/// Ctrl-C is honored.
async fn watch(ingestor: &Ingestor, config: &Config) -> Result<()> {
    let Some(period) = config.refresh_interval() else {
        anyhow::bail!("refresh_interval_minutes is 0; use `whackamole refresh` instead");
    };

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());

    tracing::info!(interval_secs = period.as_secs(), "Watching feeds");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ingestor.run_batch().await {
                    Ok(report) => print_batch(&report),
                    Err(e) => tracing::error!(error = %e, "Batch could not start"),
                }
            }
            res = &mut shutdown => {
                if let Err(e) = res {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

fn print_batch(report: &BatchReport<IngestSummary>) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "{:>5}  +{} new, {} seen, {} skipped  {}",
                outcome.feed_id, summary.inserted, summary.ignored, summary.skipped, outcome.url
            ),
            Err(e) => println!("{:>5}  failed: {}  {}", outcome.feed_id, e, outcome.url),
        }
    }
    println!(
        "{} feeds ok, {} failed, {} new articles",
        report.succeeded(),
        report.failed(),
        report.total_inserted()
    );
}

fn print_articles(articles: &[Article], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(articles)?);
        return Ok(());
    }
    for article in articles {
        println!(
            "{:>6} {} {}  [{}]",
            article.id,
            if article.is_read { " " } else { "*" },
            article.title,
            article.feed_title.as_deref().unwrap_or("?")
        );
        println!("         {}", article.link);
    }
    Ok(())
}
