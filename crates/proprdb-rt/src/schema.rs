//! Core table bootstrap and schema-state bookkeeping.
//!
//! Every proprdb store shares four core tables next to the generated
//! per-type tables:
//! - `_deleted`: tombstones, one per `(table_name, id)`
//! - `_sync`: per-remote high watermarks, one per `(object_id, table_name, remote)`
//! - `_proprdb_schema`: the projection schema hash each table was last initialized with
//! - `_unknown_types`: quarantine for inbound records whose type is not compiled in

use rusqlite::{params, Connection};

use crate::error::{ProprError, Result};

pub const CORE_TABLE_DELETED: &str = "_deleted";
pub const CORE_TABLE_SYNC: &str = "_sync";
pub const CORE_TABLE_SCHEMA_STATE: &str = "_proprdb_schema";
pub const CORE_TABLE_UNKNOWN: &str = "_unknown_types";

pub(crate) const DATA_COLUMN: &str = "data";

/// Create the core tables if they do not exist yet. Idempotent.
pub fn ensure_core_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _deleted (
            table_name TEXT NOT NULL,
            id TEXT NOT NULL,
            at_ns INTEGER NOT NULL,
            PRIMARY KEY (table_name, id)
        )",
        [],
    )
    .map_err(ProprError::storage("create _deleted table"))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS _sync (
            object_id TEXT NOT NULL,
            table_name TEXT NOT NULL,
            at_ns INTEGER NOT NULL,
            remote TEXT NOT NULL,
            PRIMARY KEY (object_id, table_name, remote)
        )",
        [],
    )
    .map_err(ProprError::storage("create _sync table"))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS _proprdb_schema (
            table_name TEXT PRIMARY KEY,
            schema_hash TEXT NOT NULL
        )",
        [],
    )
    .map_err(ProprError::storage("create _proprdb_schema table"))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS _unknown_types (
            type_name TEXT NOT NULL,
            id TEXT NOT NULL,
            at_ns INTEGER NOT NULL,
            deleted INTEGER NOT NULL,
            data_json TEXT NOT NULL,
            PRIMARY KEY (type_name, id, at_ns)
        )",
        [],
    )
    .map_err(ProprError::storage("create _unknown_types table"))?;

    Ok(())
}

/// Double-quote an identifier so callers can splice table and column names
/// into SQL safely.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read the schema hash recorded for `table_name`, if any.
pub fn stored_schema_hash(conn: &Connection, table_name: &str) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT schema_hash FROM _proprdb_schema WHERE table_name = ?1",
        [table_name],
        |row| row.get(0),
    ) {
        Ok(hash) => Ok(Some(hash)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(source) => Err(ProprError::storage(format!(
            "read schema hash for {table_name}"
        ))(source)),
    }
}

/// Record the schema hash `table_name` was initialized with.
pub fn record_schema_hash(conn: &Connection, table_name: &str, schema_hash: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO _proprdb_schema (table_name, schema_hash) VALUES (?1, ?2)
         ON CONFLICT(table_name) DO UPDATE SET schema_hash = excluded.schema_hash",
        params![table_name, schema_hash],
    )
    .map_err(ProprError::storage(format!(
        "record schema hash for {table_name}"
    )))?;
    Ok(())
}
