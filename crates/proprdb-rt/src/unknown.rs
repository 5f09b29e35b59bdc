//! Quarantine for inbound records of unknown type.
//!
//! When an interchange stream carries a type the running binary does not
//! know, the record is parked in `_unknown_types` with its envelope JSON
//! preserved verbatim. The quarantine may briefly hold several versions of
//! the same `(type_name, id)`; compaction keeps only the newest. Once the
//! type is registered, table init drains the quarantine through the
//! module's apply before the first user operation.

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProprError, Result};
use crate::jsonl::JsonlRecord;

/// Park one record in the quarantine.
pub fn insert(conn: &Connection, type_name: &str, record: &JsonlRecord) -> Result<()> {
    if type_name.trim().is_empty() {
        return Err(ProprError::InvalidArgument("empty type name".to_string()));
    }
    let data_json = serde_json::to_string(&record.data)
        .map_err(|e| ProprError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT OR REPLACE INTO _unknown_types (type_name, id, at_ns, deleted, data_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            type_name,
            record.id,
            record.at_ns,
            record.deleted as i64,
            data_json
        ],
    )
    .map_err(ProprError::storage(format!(
        "insert unknown row for {type_name}/{}/{}",
        record.id, record.at_ns
    )))?;
    Ok(())
}

/// Keep only the newest row per `(type_name, id)`; returns the number of
/// superseded rows removed. Ties on `at_ns` break by rowid.
pub fn compact_latest(conn: &Connection) -> Result<usize> {
    let removed = conn
        .execute(
            "DELETE FROM _unknown_types WHERE rowid NOT IN (
                SELECT MAX(kept.rowid)
                FROM _unknown_types kept
                JOIN (
                    SELECT type_name, id, MAX(at_ns) AS max_at_ns
                    FROM _unknown_types
                    GROUP BY type_name, id
                ) latest
                ON latest.type_name = kept.type_name
                    AND latest.id = kept.id
                    AND latest.max_at_ns = kept.at_ns
                GROUP BY kept.type_name, kept.id
            )",
            [],
        )
        .map_err(ProprError::storage("compact unknown rows"))?;
    Ok(removed)
}

/// Drain the quarantine for one type through `apply`.
///
/// Compacts first, then visits rows in ascending `(at_ns, id, rowid)` order
/// so replay is deterministic. After a successful apply every row for that
/// `(type_name, id)` is deleted, covering inserts of the same key at other
/// timestamps that landed in between. Apply errors propagate and halt the
/// drain.
pub fn replay_by_type(
    conn: &Connection,
    type_name: &str,
    mut apply: impl FnMut(JsonlRecord) -> Result<()>,
) -> Result<()> {
    if type_name.trim().is_empty() {
        return Err(ProprError::InvalidArgument("empty type name".to_string()));
    }
    compact_latest(conn)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, at_ns, deleted, data_json FROM _unknown_types
             WHERE type_name = ?1 ORDER BY at_ns ASC, id ASC, rowid ASC",
        )
        .map_err(ProprError::storage(format!(
            "select unknown rows for {type_name}"
        )))?;
    let rows = stmt
        .query_map([type_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(ProprError::storage(format!(
            "select unknown rows for {type_name}"
        )))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProprError::storage(format!(
            "iterate unknown rows for {type_name}"
        )))?;
    drop(stmt);

    if rows.is_empty() {
        return Ok(());
    }
    debug!(type_name, rows = rows.len(), "draining quarantined records");

    for (id, at_ns, deleted, data_json) in rows {
        let data: Value = serde_json::from_str(&data_json).map_err(|e| {
            ProprError::Serialization(format!("quarantined envelope for {type_name}/{id}: {e}"))
        })?;
        apply(JsonlRecord {
            id: id.clone(),
            deleted: deleted != 0,
            at_ns,
            data,
        })?;
        conn.execute(
            "DELETE FROM _unknown_types WHERE type_name = ?1 AND id = ?2",
            params![type_name, id],
        )
        .map_err(ProprError::storage(format!(
            "delete unknown rows for {type_name}/{id}"
        )))?;
    }
    Ok(())
}
