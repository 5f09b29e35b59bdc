//! Per-message table module emitter.
//!
//! For every non-omitted message this emits the typed storage module: DDL
//! and projection consts, the row struct, the table handle with init /
//! CRUD / select, and (for sync-enabled messages) the JSONL apply and
//! export routines. Emission is append-only string building; everything is
//! driven off the analyzed [`TablePlan`] in declaration order, so output is
//! byte-stable for identical input.

use inflector::Inflector;

use crate::analysis::{ProjectedColumn, ScalarKind, TablePlan};

/// Reserved words that need a raw identifier when used as a Rust field name.
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "priv", "pub", "ref", "return", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "yield",
];

pub(crate) fn rust_field_ident(field_name: &str) -> String {
    if RUST_KEYWORDS.contains(&field_name) {
        format!("r#{field_name}")
    } else {
        field_name.to_string()
    }
}

fn quoted(name: &str) -> String {
    format!("\"{name}\"")
}

/// The expression handed to `rusqlite::params!` for one projected column,
/// reading from a `data: &Message` binding. Unsigned kinds widen into the
/// signed INTEGER column affinity.
fn column_value_expr(column: &ProjectedColumn) -> String {
    let field = rust_field_ident(&column.field_name);
    match (column.kind, column.optional) {
        (ScalarKind::String | ScalarKind::Bytes, _) => format!("data.{field}.clone()"),
        (ScalarKind::Uint32, false) => format!("i64::from(data.{field})"),
        (ScalarKind::Uint32, true) => format!("data.{field}.map(i64::from)"),
        (ScalarKind::Uint64, false) => format!("data.{field} as i64"),
        (ScalarKind::Uint64, true) => format!("data.{field}.map(|value| value as i64)"),
        _ => format!("data.{field}"),
    }
}

fn create_table_sql(plan: &TablePlan) -> String {
    let mut columns = vec![
        "\"id\" TEXT PRIMARY KEY".to_string(),
        "\"at_ns\" INTEGER NOT NULL".to_string(),
        "\"data\" BLOB NOT NULL".to_string(),
    ];
    for column in &plan.columns {
        let mut definition = format!("{} {}", quoted(&column.field_name), column.kind.sql_type());
        if !column.optional {
            definition.push_str(&format!(" NOT NULL DEFAULT {}", column.kind.sql_default()));
        }
        columns.push(definition);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&plan.table_name),
        columns.join(", ")
    )
}

fn insert_sql(plan: &TablePlan) -> String {
    let mut column_names = vec![
        quoted("id"),
        quoted("at_ns"),
        quoted("data"),
    ];
    let mut placeholders = vec!["?1".to_string(), "?2".to_string(), "?3".to_string()];
    for (offset, column) in plan.columns.iter().enumerate() {
        column_names.push(quoted(&column.field_name));
        placeholders.push(format!("?{}", offset + 4));
    }
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quoted(&plan.table_name),
        column_names.join(", "),
        placeholders.join(", ")
    )
}

fn reproject_sql(plan: &TablePlan) -> String {
    let assignments = plan
        .columns
        .iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ?{}", quoted(&column.field_name), offset + 2))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE \"id\" = ?1",
        quoted(&plan.table_name)
    )
}

pub(crate) fn create_index_sql(plan: &TablePlan) -> Vec<String> {
    plan.indexes
        .iter()
        .map(|index| {
            let columns = index
                .fields
                .iter()
                .map(|field| quoted(field))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({columns})",
                quoted(&index.index_name),
                quoted(&plan.table_name)
            )
        })
        .collect()
}

/// Emit the storage module for one message.
pub fn emit_table_module(out: &mut String, plan: &TablePlan) {
    let message = &plan.message_name;
    let consts = plan.message_name.to_screaming_snake_case();
    let storage = |operation: &str| format!("{operation} {}", plan.table_name);

    // Consts and payload wiring.
    out.push_str(&format!(
        "pub const {consts}_TABLE_NAME: &str = {:?};\n",
        plan.table_name
    ));
    out.push_str(&format!(
        "pub const {consts}_TYPE_NAME: &str = {:?};\n",
        plan.type_name
    ));
    out.push_str(&format!(
        "pub const {consts}_PROJECTION_SCHEMA: &str = {:?};\n",
        plan.projection_schema()
    ));
    out.push_str(&format!(
        "pub const {consts}_SCHEMA_HASH: &str = {:?};\n\n",
        plan.schema_hash()
    ));
    out.push_str(&format!(
        "impl ::proprdb_rt::Payload for {message} {{\n    const TYPE_NAME: &'static str = {consts}_TYPE_NAME;\n}}\n\n",
    ));

    // Row struct.
    out.push_str(&format!(
        "/// One materialized row of `{}`.\n#[derive(Debug, Clone)]\npub struct {message}Row {{\n    pub id: String,\n    pub at_ns: i64,\n    pub data: {message},\n}}\n\n",
        plan.type_name
    ));

    // Table handle.
    out.push_str(&format!(
        "pub struct {message}Table<'a> {{\n    conn: &'a ::rusqlite::Connection,\n}}\n\nimpl<'a> {message}Table<'a> {{\n    pub fn new(conn: &'a ::rusqlite::Connection) -> Self {{\n        Self {{ conn }}\n    }}\n\n",
    ));

    // init
    out.push_str(
        "    /// Create or migrate the table, apply the managed indexes, and\n    /// drain any quarantined records for this type. Idempotent.\n",
    );
    out.push_str("    pub fn init(&self) -> ::proprdb_rt::Result<()> {\n");
    out.push_str(&format!(
        "        self.conn\n            .execute(\n                {:?},\n                [],\n            )\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n",
        create_table_sql(plan),
        storage("create table")
    ));
    out.push_str(&format!(
        "        if ::proprdb_rt::schema::stored_schema_hash(self.conn, {consts}_TABLE_NAME)?.as_deref()\n            != Some({consts}_SCHEMA_HASH)\n        {{\n",
    ));
    if !plan.columns.is_empty() {
        out.push_str("            self.reproject()?;\n");
    }
    out.push_str(&format!(
        "            ::proprdb_rt::schema::record_schema_hash(\n                self.conn,\n                {consts}_TABLE_NAME,\n                {consts}_SCHEMA_HASH,\n            )?;\n        }}\n",
    ));
    let create_statements = create_index_sql(plan)
        .iter()
        .map(|sql| format!("{sql:?}"))
        .collect::<Vec<_>>();
    let desired_names = plan
        .indexes
        .iter()
        .map(|index| format!("{:?}", index.index_name))
        .collect::<Vec<_>>();
    out.push_str(&format!(
        "        ::proprdb_rt::index::ensure_managed_indexes(\n            self.conn,\n            {consts}_TABLE_NAME,\n            {:?},\n            &[{}],\n            &[{}],\n        )?;\n",
        plan.index_prefix(),
        create_statements.join(", "),
        desired_names.join(", ")
    ));
    if !plan.omit_sync {
        out.push_str(&format!(
            "        ::proprdb_rt::unknown::replay_by_type(self.conn, {consts}_TYPE_NAME, |record| {{\n            self.apply_record(&record, \"\")\n        }})?;\n",
        ));
    }
    out.push_str("        Ok(())\n    }\n\n");

    // reproject
    if !plan.columns.is_empty() {
        let params = plan
            .columns
            .iter()
            .map(column_value_expr)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "    fn reproject(&self) -> ::proprdb_rt::Result<()> {{\n        let mut stmt = self\n            .conn\n            .prepare({:?})\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        let rows = stmt\n            .query_map([], |row| {{\n                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))\n            }})\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?\n            .collect::<::std::result::Result<Vec<_>, _>>()\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        drop(stmt);\n        for (id, blob) in rows {{\n            let data = <{message} as ::prost::Message>::decode(blob.as_slice())\n                .map_err(|e| ::proprdb_rt::ProprError::decode({consts}_TYPE_NAME, e))?;\n            self.conn\n                .execute(\n                    {:?},\n                    ::rusqlite::params![id, {params}],\n                )\n                .map_err(::proprdb_rt::ProprError::storage(\n                    {:?},\n                ))?;\n        }}\n        Ok(())\n    }}\n\n",
            format!(
                "SELECT \"id\", \"data\" FROM {}",
                quoted(&plan.table_name)
            ),
            storage("select rows to reproject from"),
            storage("select rows to reproject from"),
            storage("iterate rows to reproject from"),
            reproject_sql(plan),
            storage("reproject row in"),
        ));
    }

    // write_row
    let insert_params = plan
        .columns
        .iter()
        .map(column_value_expr)
        .collect::<Vec<_>>()
        .join(", ");
    let insert_params = if insert_params.is_empty() {
        String::new()
    } else {
        format!(", {insert_params}")
    };
    out.push_str(&format!(
        "    fn write_row(&self, id: &str, at_ns: i64, data: &{message}) -> ::proprdb_rt::Result<()> {{\n        let blob = ::prost::Message::encode_to_vec(data);\n        self.conn\n            .execute(\n                {:?},\n                ::rusqlite::params![id, at_ns, blob{insert_params}],\n            )\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        ::proprdb_rt::tombstone::remove(self.conn, {consts}_TABLE_NAME, id)?;\n        Ok(())\n    }}\n\n",
        insert_sql(plan),
        storage("write row in"),
    ));

    let validate_line = if plan.validate_write {
        "        ::proprdb_rt::ValidateWrite::valid(data).map_err(::proprdb_rt::ProprError::Validation)?;\n"
    } else {
        ""
    };

    // insert
    out.push_str(&format!(
        "    /// Insert `data` under a freshly allocated UUIDv7.\n    pub fn insert(&self, data: &{message}) -> ::proprdb_rt::Result<{message}Row> {{\n{validate_line}        let id = ::proprdb_rt::id::new_uuid_v7();\n        let at_ns = ::proprdb_rt::id::now_ns();\n        self.write_row(&id, at_ns, data)?;\n        Ok({message}Row {{\n            id,\n            at_ns,\n            data: data.clone(),\n        }})\n    }}\n\n",
    ));

    // insert_with_id
    if plan.allow_custom_id_insert {
        out.push_str(&format!(
            "    /// Insert `data` under a caller-supplied UUID.\n    pub fn insert_with_id(&self, id: &str, data: &{message}) -> ::proprdb_rt::Result<{message}Row> {{\n        ::proprdb_rt::id::validate_uuid(id)?;\n{validate_line}        let at_ns = ::proprdb_rt::id::now_ns();\n        self.write_row(id, at_ns, data)?;\n        Ok({message}Row {{\n            id: id.to_string(),\n            at_ns,\n            data: data.clone(),\n        }})\n    }}\n\n",
        ));
    }

    // update_by_id / update_row
    out.push_str(&format!(
        "    /// Update the object at `id`, resurrecting it when a tombstone exists.\n    pub fn update_by_id(&self, id: &str, data: &{message}) -> ::proprdb_rt::Result<{message}Row> {{\n        ::proprdb_rt::id::validate_uuid(id)?;\n{validate_line}        let at_ns = ::proprdb_rt::id::now_ns();\n        let row_at_ns = self.row_at_ns(id)?;\n        let tombstone_at_ns =\n            ::proprdb_rt::tombstone::get_at_ns(self.conn, {consts}_TABLE_NAME, id)?;\n        if row_at_ns.is_none() && tombstone_at_ns.is_none() {{\n            return Err(::proprdb_rt::ProprError::NotFound {{\n                table: {consts}_TABLE_NAME.to_string(),\n                id: id.to_string(),\n            }});\n        }}\n        if tombstone_at_ns.map_or(false, |tombstone_at_ns| tombstone_at_ns > at_ns) {{\n            return Err(::proprdb_rt::ProprError::InvalidArgument(format!(\n                \"tombstone for {{}}/{{}} is newer than the clock\",\n                {consts}_TABLE_NAME, id\n            )));\n        }}\n        self.write_row(id, at_ns, data)?;\n        Ok({message}Row {{\n            id: id.to_string(),\n            at_ns,\n            data: data.clone(),\n        }})\n    }}\n\n    pub fn update_row(&self, row: {message}Row) -> ::proprdb_rt::Result<{message}Row> {{\n        self.update_by_id(&row.id, &row.data)\n    }}\n\n",
    ));

    // delete_by_id / delete_row
    out.push_str(&format!(
        "    /// Delete the object at `id` and leave a tombstone.\n    pub fn delete_by_id(&self, id: &str) -> ::proprdb_rt::Result<()> {{\n        ::proprdb_rt::id::validate_uuid(id)?;\n        let at_ns = ::proprdb_rt::id::now_ns();\n        self.conn\n            .execute(\n                {:?},\n                [id],\n            )\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        ::proprdb_rt::tombstone::upsert(self.conn, {consts}_TABLE_NAME, id, at_ns)?;\n        Ok(())\n    }}\n\n    pub fn delete_row(&self, row: {message}Row) -> ::proprdb_rt::Result<()> {{\n        self.delete_by_id(&row.id)\n    }}\n\n",
        format!(
            "DELETE FROM {} WHERE \"id\" = ?1",
            quoted(&plan.table_name)
        ),
        storage("delete row in"),
    ));

    // select
    out.push_str(&format!(
        "    /// Select rows matching `where_clause` (positional `?n` parameters).\n    pub fn select(\n        &self,\n        where_clause: &str,\n        params: impl ::rusqlite::Params,\n    ) -> ::proprdb_rt::Result<Vec<{message}Row>> {{\n        let query = format!(\n            {:?}\n        );\n        let mut stmt = self\n            .conn\n            .prepare(&query)\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        let rows = stmt\n            .query_map(params, |row| {{\n                Ok((\n                    row.get::<_, String>(0)?,\n                    row.get::<_, i64>(1)?,\n                    row.get::<_, Vec<u8>>(2)?,\n                ))\n            }})\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?\n            .collect::<::std::result::Result<Vec<_>, _>>()\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        rows.into_iter()\n            .map(|(id, at_ns, blob)| {{\n                let data = <{message} as ::prost::Message>::decode(blob.as_slice())\n                    .map_err(|e| ::proprdb_rt::ProprError::decode({consts}_TYPE_NAME, e))?;\n                Ok({message}Row {{ id, at_ns, data }})\n            }})\n            .collect()\n    }}\n\n",
        format!(
            "SELECT \"id\", \"at_ns\", \"data\" FROM {} WHERE {{where_clause}}",
            quoted(&plan.table_name)
        ),
        storage("select rows from"),
        storage("select rows from"),
        storage("iterate rows from"),
    ));

    // row_at_ns
    out.push_str(&format!(
        "    fn row_at_ns(&self, id: &str) -> ::proprdb_rt::Result<Option<i64>> {{\n        match self.conn.query_row(\n            {:?},\n            [id],\n            |row| row.get::<_, i64>(0),\n        ) {{\n            Ok(at_ns) => Ok(Some(at_ns)),\n            Err(::rusqlite::Error::QueryReturnedNoRows) => Ok(None),\n            Err(source) => Err(::proprdb_rt::ProprError::storage(\n                {:?},\n            )(source)),\n        }}\n    }}\n",
        format!(
            "SELECT \"at_ns\" FROM {} WHERE \"id\" = ?1",
            quoted(&plan.table_name)
        ),
        storage("select row timestamp from"),
    ));

    if !plan.omit_sync {
        out.push('\n');
        emit_apply_record(out, plan);
        out.push('\n');
        emit_write_jsonl(out, plan);
    }

    out.push_str("}\n\n");
}

fn emit_apply_record(out: &mut String, plan: &TablePlan) {
    let message = &plan.message_name;
    let consts = plan.message_name.to_screaming_snake_case();
    out.push_str(&format!(
        "    /// Apply one inbound interchange record using last-writer-wins by\n    /// `atNs`. The write validation hook does not run here: the interchange\n    /// stream is authoritative even when a payload is locally invalid.\n    /// Stale deletion records return without touching `_sync`.\n    pub fn apply_record(\n        &self,\n        record: &::proprdb_rt::JsonlRecord,\n        remote: &str,\n    ) -> ::proprdb_rt::Result<()> {{\n        if ::proprdb_rt::id::validate_uuid(&record.id).is_err() {{\n            ::tracing::warn!(\n                id = %record.id,\n                \"skipping {} record with invalid id\"\n            );\n            return Ok(());\n        }}\n        let local_max =\n            ::proprdb_rt::tombstone::local_max_at_ns(self.conn, {consts}_TABLE_NAME, &record.id)?;\n        if local_max >= record.at_ns {{\n            if record.deleted {{\n                return Ok(());\n            }}\n        }} else if record.deleted {{\n            self.conn\n                .execute(\n                    {:?},\n                    [record.id.as_str()],\n                )\n                .map_err(::proprdb_rt::ProprError::storage(\n                    {:?},\n                ))?;\n            ::proprdb_rt::tombstone::upsert(\n                self.conn,\n                {consts}_TABLE_NAME,\n                &record.id,\n                record.at_ns,\n            )?;\n        }} else {{\n            let data: {message} = ::proprdb_rt::envelope::unmarshal_any_json(&record.data)?;\n            self.write_row(&record.id, record.at_ns, &data)?;\n        }}\n        ::proprdb_rt::sync::upsert(\n            self.conn,\n            &record.id,\n            {consts}_TABLE_NAME,\n            remote,\n            record.at_ns,\n        )\n    }}\n",
        plan.type_name,
        format!(
            "DELETE FROM {} WHERE \"id\" = ?1",
            quoted(&plan.table_name)
        ),
        format!("delete row in {}", plan.table_name),
    ));
}

fn emit_write_jsonl(out: &mut String, plan: &TablePlan) {
    let message = &plan.message_name;
    let consts = plan.message_name.to_screaming_snake_case();
    let storage = |operation: &str| format!("{operation} {}", plan.table_name);
    out.push_str(&format!(
        "    /// Export rows and tombstones newer than the remote's watermark.\n    pub fn write_jsonl(\n        &self,\n        remote: &str,\n        writer: &mut dyn ::std::io::Write,\n    ) -> ::proprdb_rt::Result<()> {{\n        let mut stmt = self\n            .conn\n            .prepare(\n                {:?},\n            )\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        let rows = stmt\n            .query_map([], |row| {{\n                Ok((\n                    row.get::<_, String>(0)?,\n                    row.get::<_, i64>(1)?,\n                    row.get::<_, Vec<u8>>(2)?,\n                ))\n            }})\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?\n            .collect::<::std::result::Result<Vec<_>, _>>()\n            .map_err(::proprdb_rt::ProprError::storage(\n                {:?},\n            ))?;\n        drop(stmt);\n        for (id, at_ns, blob) in rows {{\n            if !::proprdb_rt::sync::needs_send(self.conn, &id, {consts}_TABLE_NAME, remote, at_ns)? {{\n                continue;\n            }}\n            let data = <{message} as ::prost::Message>::decode(blob.as_slice())\n                .map_err(|e| ::proprdb_rt::ProprError::decode({consts}_TYPE_NAME, e))?;\n            let record = ::proprdb_rt::JsonlRecord {{\n                id: id.clone(),\n                deleted: false,\n                at_ns,\n                data: ::proprdb_rt::envelope::marshal_any_json(&data)?,\n            }};\n            ::proprdb_rt::jsonl::write_record(writer, &record)?;\n            ::proprdb_rt::sync::upsert(self.conn, &id, {consts}_TABLE_NAME, remote, at_ns)?;\n        }}\n        for (id, at_ns) in ::proprdb_rt::tombstone::list_for_table(self.conn, {consts}_TABLE_NAME)? {{\n            if !::proprdb_rt::sync::needs_send(self.conn, &id, {consts}_TABLE_NAME, remote, at_ns)? {{\n                continue;\n            }}\n            let record = ::proprdb_rt::JsonlRecord {{\n                id: id.clone(),\n                deleted: true,\n                at_ns,\n                data: ::proprdb_rt::envelope::type_only_any_json({consts}_TYPE_NAME),\n            }};\n            ::proprdb_rt::jsonl::write_record(writer, &record)?;\n            ::proprdb_rt::sync::upsert(self.conn, &id, {consts}_TABLE_NAME, remote, at_ns)?;\n        }}\n        Ok(())\n    }}\n",
        format!(
            "SELECT \"id\", \"at_ns\", \"data\" FROM {} ORDER BY \"at_ns\" ASC, \"id\" ASC",
            quoted(&plan.table_name)
        ),
        storage("select rows from"),
        storage("select rows from"),
        storage("iterate rows from"),
    ));
}
