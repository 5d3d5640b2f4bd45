//! streamnet: command-line front end for streamyyy-net
//!
//! Issues requests through the same client the app uses and inspects the
//! on-disk response cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use streamyyy_net::connectivity::probe::probe_once;
use streamyyy_net::{ApiClient, CachePolicy, Config, Endpoint, PathStatus, PersistentCache, Secrets};

/// streamyyy-net CLI
#[derive(Parser)]
#[command(name = "streamnet")]
#[command(version = streamyyy_net::PKG_VERSION)]
#[command(about = "Streamyyy network client and cache tool")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "STREAMYYY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET a path (relative to the configured base URL) and print the JSON body
    Get {
        /// Path or absolute URL
        path: String,
        /// Query parameters as name=value
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Serve from / store into the cache for this many seconds
        #[arg(long)]
        cache_ttl: Option<u64>,
        /// Override the configured retry budget
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Inspect or maintain the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check reachability of a host:port with a TCP connect
    Probe {
        /// Target, e.g. api.streamyyy.com:443
        target: String,
        /// Connect timeout in seconds
        #[arg(long, default_value_t = 3)]
        timeout: u64,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print entry count, size and hit statistics
    Stats,
    /// Remove expired entries
    Sweep,
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Version => {
            println!("streamnet {}", streamyyy_net::version_string());
        }

        Command::Probe { target, timeout } => {
            let status = probe_once(&target, Duration::from_secs(timeout)).await;
            let label = match status {
                PathStatus::Satisfied => "reachable",
                PathStatus::RequiresConnection => "requires connection",
                PathStatus::Unsatisfied => "unreachable",
            };
            println!("{target}: {label}");
        }

        Command::Cache { action } => {
            let config = Config::load_or_default(args.config.as_deref())?;
            let cache = PersistentCache::open(config.cache_config()).await?;
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats().await;
                    println!("directory: {}", cache.config().directory().display());
                    println!("entries: {}", stats.entry_count);
                    println!("payload bytes: {}", stats.total_size_bytes);
                    println!("disk bytes: {}", cache.disk_usage().await);
                }
                CacheAction::Sweep => {
                    let removed = cache.sweep_expired().await;
                    println!("removed {removed} expired entries");
                }
                CacheAction::Clear => {
                    cache.clear_all().await;
                    println!("cache cleared");
                }
            }
        }

        Command::Get {
            path,
            query,
            cache_ttl,
            retries,
        } => {
            let config = Config::load_or_default(args.config.as_deref())?;
            let secrets = Secrets::load()?;

            let mut builder = config.client_builder()?;
            if secrets.api_token().is_some() {
                builder = builder.credentials(Arc::new(secrets));
            }
            if cache_ttl.is_some() {
                let cache = PersistentCache::open(config.cache_config()).await?;
                builder = builder.cache(Arc::new(cache));
            }
            let client: ApiClient = builder.build()?;

            let mut endpoint = Endpoint::get(path);
            for (name, value) in query {
                endpoint = endpoint.query(name, value);
            }
            if let Some(secs) = cache_ttl {
                endpoint = endpoint.cache_policy(CachePolicy::CacheFirst {
                    ttl: Duration::from_secs(secs),
                });
            }

            let retries = retries.unwrap_or(config.retry.max_retries);
            let body: serde_json::Value = client.request_with_retries(&endpoint, retries).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            let metrics = client.metrics().await;
            eprintln!("{}", serde_json::to_string(&metrics)?);
        }
    }

    Ok(())
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}
