//! Compact command: squeeze the unknown-type quarantine.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing::info;

use proprdb_rt::unknown;

pub fn execute(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        bail!("store file {} does not exist", db_path.display());
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("open store {}", db_path.display()))?;

    let removed = unknown::compact_latest(&conn).context("compact quarantine")?;
    info!(removed, "quarantine compacted");
    println!("removed {removed} superseded quarantine rows");
    Ok(())
}
