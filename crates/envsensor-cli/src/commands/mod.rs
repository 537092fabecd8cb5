//! Command implementations for the CLI.

mod forward;
mod set_interval;
mod sync;

use anyhow::{Context, Result};
use tracing::info;

use envsensor_store::Store;

use crate::config::Config;

pub use forward::cmd_forward;
pub use set_interval::cmd_set_interval;
pub use sync::cmd_sync;

/// Open the configured database.
///
/// A dry run against a database that does not exist yet uses an in-memory
/// one instead of creating the file.
fn open_store(config: &Config, dry_run: bool) -> Result<Store> {
    let path = config.storage.resolved_path();
    if dry_run && !path.exists() {
        info!(
            "{} does not exist; dry run uses an in-memory database",
            path.display()
        );
        return Store::open_in_memory().context("Failed to open in-memory database");
    }
    Store::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}
