//! Per-remote sync watermarks.
//!
//! `_sync` records the newest `at_ns` already shipped to each remote per
//! `(object_id, table_name)`. The watermark only moves forward. The empty
//! remote string is a sentinel that bypasses the layer entirely: reads
//! always report "needs send" and writes are skipped, which makes an
//! export against the empty remote an idempotent dry run. Whitespace-only
//! remotes are ordinary remotes; matching is plain string equality.

use rusqlite::{params, Connection};

use crate::error::{ProprError, Result};

/// Whether `at_ns` for this object is newer than what the remote has seen.
pub fn needs_send(
    conn: &Connection,
    object_id: &str,
    table_name: &str,
    remote: &str,
    at_ns: i64,
) -> Result<bool> {
    if remote.is_empty() {
        return Ok(true);
    }
    match conn.query_row(
        "SELECT at_ns FROM _sync WHERE object_id = ?1 AND table_name = ?2 AND remote = ?3",
        params![object_id, table_name, remote],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(synced_at_ns) => Ok(synced_at_ns < at_ns),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(true),
        Err(source) => Err(ProprError::storage(format!(
            "select sync row for {table_name}/{object_id}/{remote}"
        ))(source)),
    }
}

/// Raise the watermark to `at_ns` if it is higher than the stored value.
pub fn upsert(
    conn: &Connection,
    object_id: &str,
    table_name: &str,
    remote: &str,
    at_ns: i64,
) -> Result<()> {
    if remote.is_empty() {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO _sync (object_id, table_name, at_ns, remote) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(object_id, table_name, remote)
         DO UPDATE SET at_ns = MAX(at_ns, excluded.at_ns)",
        params![object_id, table_name, at_ns, remote],
    )
    .map_err(ProprError::storage(format!(
        "upsert sync row for {table_name}/{object_id}/{remote}"
    )))?;
    Ok(())
}
