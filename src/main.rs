use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use reel::app::{build_http_client, App, AppEvent};
use reel::config::Config;
use reel::douban::{Category, FeedCursor, FeedLoader, ProxyClient};
use reel::storage::{Database, DatabaseError, TagStore, RESERVED_TAG};
use reel::ui;

/// Get the config directory path (~/.config/reel/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("reel");
    Ok(config_dir)
}

/// Route tracing output to a log file in the config directory.
///
/// The TUI owns the terminal, so stderr is not available as a log sink while
/// it runs. Nothing is written unless `RUST_LOG` enables it.
fn init_logging(config_dir: &Path) -> Result<()> {
    let log_path = config_dir.join("reel.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "reel", about = "Terminal movie & TV recommendation browser")]
struct Args {
    /// Config file path (default: ~/.config/reel/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file path (default: ~/.config/reel/reel.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Print feed pages to stdout instead of starting the TUI
    #[arg(long)]
    print: bool,

    /// Category to browse: "movie" or "tv" (default: last used)
    #[arg(long, value_name = "CATEGORY")]
    category: Option<String>,

    /// Tag to load in --print mode (default: 热门)
    #[arg(long, value_name = "TAG")]
    tag: Option<String>,

    /// Number of pages to fetch in --print mode
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    if let Err(e) = init_logging(&config_dir) {
        eprintln!("Warning: file logging disabled: {:#}", e);
    }

    // SEC: Set directory permissions on Unix (user-only access). The config
    // may hold a relay auth token and the database holds user tag lists.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;

    let db_path = args.db.clone().unwrap_or_else(|| config_dir.join("reel.db"));

    // Handle --reset-db flag
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let category_flag = match args.category.as_deref() {
        Some(raw) => Some(Category::from_setting(raw).ok_or_else(|| {
            anyhow::anyhow!("Unknown category '{}' (expected \"movie\" or \"tv\")", raw)
        })?),
        None => None,
    };

    // --print never opens the database, so it works alongside a running
    // instance and on machines that only want the feed on stdout.
    if args.print {
        let category = category_flag.unwrap_or(Category::Movie);
        let tag = args.tag.as_deref().unwrap_or(RESERVED_TAG);
        return print_feed(&config, category, tag, args.pages).await;
    }

    // Open database
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(e @ DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    // Restore persisted state; CLI flags win over saved settings
    let enabled = db.feed_enabled().await.context("Failed to read settings")?;
    let category = match category_flag {
        Some(c) => c,
        None => db
            .last_category()
            .await
            .context("Failed to read settings")?
            .unwrap_or(Category::Movie),
    };

    let tag_store = TagStore::load(db.clone())
        .await
        .context("Failed to load tag lists")?;

    // Create app state
    let mut app = App::new(db, &config, tag_store, category, enabled)
        .context("Failed to create application")?;

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    // Run the TUI
    ui::run(&mut app, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}

/// Fetch pages sequentially and print one `rating  title  url` line per item.
async fn print_feed(config: &Config, category: Category, tag: &str, pages: u32) -> Result<()> {
    let client = build_http_client()?;
    let proxy = ProxyClient::new(
        client,
        config.proxy_endpoints(),
        config.request_timeout(),
        config.referer.clone(),
        config.proxy_auth_token(),
    );
    let loader = FeedLoader::new(proxy, config.api_base.clone(), config.max_retries);
    let mut cursor = FeedCursor::new(category, tag, config.page_size);

    let mut total = 0usize;
    for _ in 0..pages {
        // None means the feed is exhausted; load_more already refuses to
        // re-request past the end.
        let Some(page) = loader
            .load_more(&mut cursor)
            .await
            .context("Feed request failed")?
        else {
            break;
        };
        for item in &page.items {
            println!("{:>4}  {}  {}", item.rating, item.title, item.detail_url);
        }
        total += page.items.len();
    }

    if total == 0 {
        println!("No items for {} tag \"{}\".", category.label(), tag);
    }
    Ok(())
}
