//! Managed index lifecycle.
//!
//! The generator owns every index whose name starts with the table's
//! `idx_<table>__` prefix. Init creates the desired set, then drops any
//! generator-owned index that is no longer desired. Indexes outside the
//! prefix belong to the user and are never touched.

use rusqlite::Connection;

use crate::error::{ProprError, Result};
use crate::schema::quote_identifier;

/// Apply the managed-index discipline for one table.
pub fn ensure_managed_indexes(
    conn: &Connection,
    table_name: &str,
    managed_prefix: &str,
    create_index_sql: &[&str],
    desired_names: &[&str],
) -> Result<()> {
    for create_sql in create_index_sql {
        conn.execute(create_sql, [])
            .map_err(ProprError::storage(format!(
                "create index for {table_name}"
            )))?;
    }

    let list_query = format!(
        "SELECT name FROM pragma_index_list({})",
        quote_identifier(table_name)
    );
    let mut stmt = conn
        .prepare(&list_query)
        .map_err(ProprError::storage(format!(
            "read indexes for {table_name}"
        )))?;
    let index_names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(ProprError::storage(format!(
            "read indexes for {table_name}"
        )))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProprError::storage(format!(
            "iterate indexes for {table_name}"
        )))?;
    drop(stmt);

    for index_name in index_names {
        if !index_name.starts_with(managed_prefix) {
            continue;
        }
        if desired_names.contains(&index_name.as_str()) {
            continue;
        }
        let drop_sql = format!("DROP INDEX IF EXISTS {}", quote_identifier(&index_name));
        conn.execute(&drop_sql, [])
            .map_err(ProprError::storage(format!(
                "drop stale index {index_name} for {table_name}"
            )))?;
    }

    Ok(())
}
