//! Row counts and byte sizes per table.
//!
//! Tables carrying a `data` blob are sized by `SUM(LENGTH(data))`; for
//! everything else the size is estimated by summing each column cast to a
//! blob. Missing tables surface as a table-qualified error.

use rusqlite::Connection;

use crate::error::{ProprError, Result};
use crate::schema::{quote_identifier, DATA_COLUMN};
use crate::types::{TableDescriptor, TableStats};

/// Introspect every listed table.
pub fn table_stats(conn: &Connection, descriptors: &[TableDescriptor]) -> Result<Vec<TableStats>> {
    let mut stats = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        stats.push(TableStats {
            descriptor: descriptor.clone(),
            object_count: object_count(conn, &descriptor.table_name)?,
            disk_usage_bytes: disk_usage_bytes(conn, &descriptor.table_name)?,
        });
    }
    Ok(stats)
}

fn object_count(conn: &Connection, table_name: &str) -> Result<i64> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
    conn.query_row(&query, [], |row| row.get(0))
        .map_err(ProprError::storage(format!(
            "count objects for table {table_name}"
        )))
}

fn disk_usage_bytes(conn: &Connection, table_name: &str) -> Result<i64> {
    let column_names = column_names(conn, table_name)?;
    let table_identifier = quote_identifier(table_name);
    let query = if column_names.iter().any(|name| name == DATA_COLUMN) {
        format!(
            "SELECT COALESCE(SUM(LENGTH({})), 0) FROM {table_identifier}",
            quote_identifier(DATA_COLUMN)
        )
    } else {
        format!(
            "SELECT COALESCE(SUM({}), 0) FROM {table_identifier}",
            estimated_row_bytes_sql(&column_names)
        )
    };
    conn.query_row(&query, [], |row| row.get(0))
        .map_err(ProprError::storage(format!(
            "read disk usage for table {table_name}"
        )))
}

fn column_names(conn: &Connection, table_name: &str) -> Result<Vec<String>> {
    let query = format!("PRAGMA table_info({})", quote_identifier(table_name));
    let mut stmt = conn.prepare(&query).map_err(ProprError::storage(format!(
        "read columns for table {table_name}"
    )))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(ProprError::storage(format!(
            "read columns for table {table_name}"
        )))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProprError::storage(format!(
            "iterate columns for table {table_name}"
        )))?;
    Ok(names)
}

fn estimated_row_bytes_sql(column_names: &[String]) -> String {
    if column_names.is_empty() {
        return "0".to_string();
    }
    column_names
        .iter()
        .map(|name| format!("COALESCE(LENGTH(CAST({} AS BLOB)), 0)", quote_identifier(name)))
        .collect::<Vec<_>>()
        .join(" + ")
}
