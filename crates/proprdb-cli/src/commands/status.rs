//! Status command: table introspection over an existing store file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};

use proprdb_rt::{introspect, TableDescriptor};

pub fn execute(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        bail!("store file {} does not exist", db_path.display());
    }
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("open store {}", db_path.display()))?;

    let descriptors = catalog(&conn)?;
    let stats = introspect::table_stats(&conn, &descriptors)
        .context("introspect store tables")?;

    println!("{:<40} {:>12} {:>14}", "TABLE", "OBJECTS", "BYTES");
    let mut total_objects = 0i64;
    let mut total_bytes = 0i64;
    for entry in &stats {
        println!(
            "{:<40} {:>12} {:>14}",
            entry.descriptor.table_name, entry.object_count, entry.disk_usage_bytes
        );
        if !entry.descriptor.is_core {
            total_objects += entry.object_count;
        }
        total_bytes += entry.disk_usage_bytes;
    }
    println!();
    println!("{total_objects} objects across {} generated tables, {total_bytes} bytes total", stats.iter().filter(|entry| !entry.descriptor.is_core).count());

    Ok(())
}

/// The tables worth reporting: the four core tables plus every table that
/// has registered a projection schema.
fn catalog(conn: &Connection) -> Result<Vec<TableDescriptor>> {
    let mut descriptors: Vec<TableDescriptor> = [
        proprdb_rt::CORE_TABLE_DELETED,
        proprdb_rt::CORE_TABLE_SYNC,
        proprdb_rt::CORE_TABLE_SCHEMA_STATE,
        proprdb_rt::CORE_TABLE_UNKNOWN,
    ]
    .into_iter()
    .map(|table_name| TableDescriptor {
        table_name: table_name.to_string(),
        type_name: String::new(),
        is_core: true,
        sync_enabled: false,
    })
    .collect();

    let mut stmt = conn
        .prepare("SELECT table_name FROM _proprdb_schema ORDER BY table_name")
        .context("read table catalog (is this a proprdb store?)")?;
    let generated = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("read table catalog")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("iterate table catalog")?;
    for table_name in generated {
        descriptors.push(TableDescriptor {
            table_name,
            type_name: String::new(),
            is_core: false,
            sync_enabled: false,
        });
    }

    Ok(descriptors)
}
