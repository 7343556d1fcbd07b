//! tiercache CLI
//!
//! Runs one operation against a tiered cache of JSON values.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tiercache::{CacheConfig, TieredCache};
use tracing_subscriber::{fmt, EnvFilter};

/// tiercache CLI - inspect and populate a tiered cache
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Redis URL for tier 2, e.g. redis://127.0.0.1:6379; omit to disable it
    #[arg(short, long)]
    remote: Option<String>,

    /// Directory for on-disk records
    #[arg(short, long, default_value = "./cache")]
    disk_dir: PathBuf,

    /// Disable the disk tier
    #[arg(long, default_value_t = false)]
    no_disk: bool,

    /// Memory tier default TTL in milliseconds
    #[arg(long, default_value_t = 300_000)]
    memory_ttl_ms: u64,

    /// Remote tier default TTL in milliseconds
    #[arg(long, default_value_t = 3_600_000)]
    remote_ttl_ms: u64,

    /// Disk tier default TTL in milliseconds
    #[arg(long, default_value_t = 86_400_000)]
    disk_ttl_ms: u64,

    #[command(subcommand)]
    command: Op,
}

#[derive(Subcommand, Debug)]
enum Op {
    /// Print the cached value for a key
    Get { key: String },

    /// Store a JSON value in every tier
    Set {
        key: String,
        /// JSON document, e.g. '{"data":1}'
        value: String,
        /// Override the TTL of all tiers, in milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,
    },

    /// Remove a key from every tier
    Del { key: String },

    /// Sweep expired disk records
    Cleanup,

    /// Show which tiers are configured and available
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tiercache=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = CacheConfig::default()
        .with_memory_ttl(Duration::from_millis(args.memory_ttl_ms))
        .with_remote_ttl(Duration::from_millis(args.remote_ttl_ms))
        .with_disk_ttl(Duration::from_millis(args.disk_ttl_ms))
        .with_disk_dir(&args.disk_dir);
    if args.no_disk {
        config = config.without_disk();
    }
    if let Some(remote) = &args.remote {
        config = config.with_remote_endpoint(remote);
    }

    let cache: TieredCache<Value> = TieredCache::new(config);
    cache.init().await;

    match args.command {
        Op::Get { key } => match cache.get(&key).await {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(nil)"),
        },

        Op::Set { key, value, ttl_ms } => {
            let value: Value = serde_json::from_str(&value)?;
            cache.set(&key, value, ttl_ms.map(Duration::from_millis)).await;
            println!("OK");
        }

        Op::Del { key } => {
            let removed = cache.remove(&key).await;
            println!("(integer) {}", removed as i64);
        }

        Op::Cleanup => {
            cache.cleanup().await;
            println!("OK");
            return Ok(());
        }

        Op::Status => {
            let status = cache.tier_status().await;
            println!("memory: available");
            println!(
                "remote: {}",
                describe(status.remote_configured, status.remote_available)
            );
            println!(
                "disk:   {}",
                describe(status.disk_configured, status.disk_available)
            );
        }
    }

    let stats = cache.stats();
    tracing::debug!(?stats, "Cache statistics");
    cache.cleanup().await;
    Ok(())
}

fn describe(configured: bool, available: bool) -> &'static str {
    match (configured, available) {
        (false, _) => "disabled",
        (true, true) => "available",
        (true, false) => "unavailable",
    }
}
