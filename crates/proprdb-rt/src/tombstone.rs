//! Tombstones and the effective last-update time.
//!
//! A tombstone in `_deleted` records when `(table_name, id)` was deleted and
//! suppresses resurrection by older updates. A strictly newer live update
//! removes the tombstone again.

use rusqlite::{params, Connection};

use crate::error::{ProprError, Result};
use crate::schema::quote_identifier;

/// Write or raise the tombstone for `(table_name, id)`.
pub fn upsert(conn: &Connection, table_name: &str, id: &str, at_ns: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO _deleted (table_name, id, at_ns) VALUES (?1, ?2, ?3)
         ON CONFLICT(table_name, id) DO UPDATE SET at_ns = MAX(at_ns, excluded.at_ns)",
        params![table_name, id, at_ns],
    )
    .map_err(ProprError::storage(format!(
        "upsert tombstone for {table_name}/{id}"
    )))?;
    Ok(())
}

/// Drop the tombstone for `(table_name, id)`, if any.
pub fn remove(conn: &Connection, table_name: &str, id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM _deleted WHERE table_name = ?1 AND id = ?2",
        params![table_name, id],
    )
    .map_err(ProprError::storage(format!(
        "remove tombstone for {table_name}/{id}"
    )))?;
    Ok(())
}

/// The tombstone timestamp for `(table_name, id)`, if one exists.
pub fn get_at_ns(conn: &Connection, table_name: &str, id: &str) -> Result<Option<i64>> {
    match conn.query_row(
        "SELECT at_ns FROM _deleted WHERE table_name = ?1 AND id = ?2",
        params![table_name, id],
        |row| row.get(0),
    ) {
        Ok(at_ns) => Ok(Some(at_ns)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(source) => Err(ProprError::storage(format!(
            "select tombstone timestamp for {table_name}/{id}"
        ))(source)),
    }
}

/// All tombstones for one table, ordered by `(at_ns, id)` so exports are
/// deterministic.
pub fn list_for_table(conn: &Connection, table_name: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, at_ns FROM _deleted WHERE table_name = ?1 ORDER BY at_ns ASC, id ASC",
        )
        .map_err(ProprError::storage(format!(
            "select tombstones for {table_name}"
        )))?;
    let rows = stmt
        .query_map([table_name], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(ProprError::storage(format!(
            "select tombstones for {table_name}"
        )))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProprError::storage(format!(
            "iterate tombstones for {table_name}"
        )))?;
    Ok(rows)
}

/// The effective last-update time for `(table_name, id)`:
/// `max(live row at_ns, tombstone at_ns)`, or -1 when neither exists.
///
/// Two point reads; the caller's transaction makes them consistent.
pub fn local_max_at_ns(conn: &Connection, table_name: &str, id: &str) -> Result<i64> {
    let mut max_at_ns = -1i64;

    let select_row = format!(
        "SELECT at_ns FROM {} WHERE id = ?1",
        quote_identifier(table_name)
    );
    match conn.query_row(&select_row, [id], |row| row.get::<_, i64>(0)) {
        Ok(row_at_ns) => max_at_ns = max_at_ns.max(row_at_ns),
        Err(rusqlite::Error::QueryReturnedNoRows) => {}
        Err(source) => {
            return Err(ProprError::storage(format!(
                "select row timestamp for {table_name}/{id}"
            ))(source))
        }
    }

    if let Some(tombstone_at_ns) = get_at_ns(conn, table_name, id)? {
        max_at_ns = max_at_ns.max(tombstone_at_ns);
    }

    Ok(max_at_ns)
}
