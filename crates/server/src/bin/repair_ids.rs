//! Gives a fresh id to every transaction whose id already appeared earlier
//! in the store file. The first holder of an id keeps it.
//!
//! Usage: `dompet-repair-ids [DB_PATH]` (defaults to the configured store).

use std::path::PathBuf;

use anyhow::Context;
use dompet_server::ServerConfig;
use dompet_storage::{CorruptionPolicy, JsonStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load()?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.db_path.clone());

    if !path.exists() {
        anyhow::bail!("Store file not found: {}", path.display());
    }

    // A repair never degrades: an unreadable file is left for a human.
    let store = JsonStore::new(&path, CorruptionPolicy::FailClosed);
    let total = store
        .transaction_count()
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let fixed = store.repair_duplicate_ids().await?;

    if fixed == 0 {
        println!("No duplicate IDs found among {total} transactions");
    } else {
        println!("Fixed {fixed} duplicate IDs among {total} transactions");
    }
    Ok(())
}
