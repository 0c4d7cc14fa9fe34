//! Minimal embedding example for ipam-core
//!
//! Builds an engine from the environment, hands out a few addresses, then
//! persists the result and restores it into a second engine.
//!
//! Environment:
//! - `IPAM_PREFIX`: bucket namespace (default `demo`)
//! - `IPAM_ADDRS_PER_BUCKET`: bucket capacity (default 4096)
//! - `IPAM_SNAPSHOT_PATH`: snapshot file (default under the temp dir)
//! - `IPAM_LOG_LEVEL`: trace, debug, info, warn or error (default info)

use anyhow::Context;
use ipam_core::config::DEFAULT_ADDR_NUM_PER_BUCKET;
use ipam_core::{FileSnapshotStore, Ipam, IpamConfig, IpamEngine, LabelMap, SnapshotStore};
use std::env;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Settings read from `IPAM_*` variables
struct DemoEnv {
    prefix: String,
    addrs_per_bucket: usize,
    snapshot_path: PathBuf,
    log_level: String,
}

impl DemoEnv {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            prefix: env::var("IPAM_PREFIX").unwrap_or_else(|_| "demo".to_string()),
            addrs_per_bucket: match env::var("IPAM_ADDRS_PER_BUCKET") {
                Ok(raw) => raw
                    .parse()
                    .with_context(|| format!("IPAM_ADDRS_PER_BUCKET is not a number: {raw}"))?,
                Err(_) => DEFAULT_ADDR_NUM_PER_BUCKET,
            },
            snapshot_path: env::var("IPAM_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("ipam-demo").join("snapshot.bin")),
            log_level: env::var("IPAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn config(&self) -> IpamConfig {
        IpamConfig::new(self.prefix.as_str()).with_addr_num_per_bucket(self.addrs_per_bucket)
    }
}

fn labels(pairs: &[(&str, &str)]) -> LabelMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let demo = DemoEnv::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(demo.level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    println!("=== Embedded ipam-core Example ===\n");

    println!("1. Creating engine (prefix {:?})...", demo.prefix);
    let ipam = IpamEngine::new(demo.config())?;
    ipam.set_label("owner", "embedded-demo").await;

    println!("2. Adding zones...");
    for literal in ["192.168.10.0/24", "fd00::100-fd00::1ff"] {
        ipam.add_zone(literal, false).await?;
        info!(zone = literal, "zone added");
    }
    ipam.set_zone_label("192.168.10.0/24", "vlan", "10").await?;
    println!("   idle addresses: {}", ipam.idle_count().await);

    println!("3. Reserving the gateway and allocating...");
    ipam.reserve_addr("192.168.10.1", &labels(&[("role", "gateway")]))
        .await?;
    let web = ipam
        .allocate_addr_next(&labels(&[("host", "web-1")]))
        .await?;
    let db = ipam
        .allocate_addr_next(&labels(&[("host", "db-1")]))
        .await?;
    ipam.allocate_addr_specific("fd00::100", &labels(&[("host", "web-1")]))
        .await?;
    println!("   web-1 -> {web}, fd00::100");
    println!("   db-1  -> {db}");

    println!("4. Releasing db-1...");
    ipam.release_addr(&db.to_string()).await?;
    println!("   used: {:?}", ipam.used_addrs().await);
    println!("   reserved: {:?}", ipam.reserved_addrs().await);

    println!("5. Persisting to {}...", demo.snapshot_path.display());
    let store = FileSnapshotStore::new(&demo.snapshot_path).await?;
    ipam.persist_to(&store, true).await?;

    println!("6. Restoring into a second engine...");
    let restored = IpamEngine::new(demo.config())?;
    if !restored.restore_from(&store).await? {
        anyhow::bail!("snapshot {} is empty", demo.snapshot_path.display());
    }
    println!("   zones: {:?}", restored.literals().await);
    println!("   used: {:?}", restored.used_addrs().await);
    println!(
        "   labels of {web}: {:?}",
        restored.addr_labels(&web.to_string()).await?
    );
    println!("   idle addresses: {}", restored.idle_count().await);

    store.clear().await?;

    println!("\n=== Embedding Successful ===");
    Ok(())
}
