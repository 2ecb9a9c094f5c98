use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedpress::config::Config;
use feedpress::feed::FeedFetcher;
use feedpress::import::{ImportOptions, ImportPipeline};
use feedpress::scheduler::{ImportScheduler, TokioSchedulerHost};
use feedpress::storage::{Database, DatabaseError, MediaLibrary, Post};
use feedpress::util::display_width;

/// Widest title column in `posts` output before titles overflow.
const MAX_TITLE_COLUMN: usize = 60;

/// Get the config directory path (~/.config/feedpress/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedpress"))
}

#[derive(Parser, Debug)]
#[command(name = "feedpress", about = "Import the newest item of each RSS feed as an article")]
struct Args {
    /// Config file (default: ~/.config/feedpress/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one import now and print a status line per feed
    Import {
        /// Print the result as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Run imports on the configured frequency until Ctrl-C
    Schedule,
    /// List recently published posts
    Posts {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // User-only access: the directory holds the database and downloaded media
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path_in(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    match args.command {
        Command::Import { json } => {
            let pipeline = build_pipeline(&config, &config_dir, db)?;
            let result = pipeline.run_all(config.feed_configs()).await;
            if json {
                let out = serde_json::to_string_pretty(&result)
                    .context("Failed to serialize import result")?;
                println!("{out}");
            } else {
                for line in result.status_lines() {
                    println!("{line}");
                }
            }
        }
        Command::Schedule => {
            if config.feed_configs().is_empty() {
                eprintln!(
                    "Warning: no feeds configured in {}; scheduled runs will import nothing",
                    config_path.display()
                );
            }

            let pipeline = Arc::new(build_pipeline(&config, &config_dir, db)?);
            let scheduler = ImportScheduler::new(Arc::new(TokioSchedulerHost::new()), pipeline);
            scheduler.ensure_registered(config.frequency, config.feed_configs().to_vec());
            println!(
                "Importing {} feed(s) {}. Press Ctrl-C to stop.",
                config.feed_configs().len(),
                config.frequency
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            scheduler.shutdown();
            println!("Schedule stopped.");
        }
        Command::Posts { limit } => {
            let posts = db
                .recent_posts(limit)
                .await
                .context("Failed to load posts")?;
            if posts.is_empty() {
                println!("No posts imported yet.");
            } else {
                print_posts(&posts);
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config, config_dir: &std::path::Path, db: Database) -> Result<ImportPipeline> {
    let timeout = config.fetch_timeout();
    let fetcher = FeedFetcher::new(timeout).context("Failed to build HTTP client")?;

    let media = MediaLibrary::new(db.clone(), config.media_dir_in(config_dir))
        .context("Failed to build HTTP client")?
        .with_timeout(timeout);

    let db = Arc::new(db);
    Ok(ImportPipeline::new(
        Arc::new(fetcher),
        db.clone(),
        Arc::new(media),
        db,
        ImportOptions {
            brand: config.brand.clone(),
            author_id: config.author_id,
        },
    ))
}

fn print_posts(posts: &[Post]) {
    let column = posts
        .iter()
        .map(|p| display_width(&p.title))
        .max()
        .unwrap_or(0)
        .min(MAX_TITLE_COLUMN);

    for post in posts {
        let date = post
            .published_at_utc()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let pad = column.saturating_sub(display_width(&post.title));
        println!(
            "{:>6}  {}  {}{}  {}",
            post.id,
            date,
            post.title,
            " ".repeat(pad),
            post.source_link
        );
    }
}
