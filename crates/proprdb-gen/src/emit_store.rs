//! Container emitter: the aggregated per-file `Store` handle.
//!
//! The container owns the type-name dispatch for JSONL import: known
//! sync-enabled types route to their table's apply, sync-disabled types are
//! skipped with a diagnostic, and everything else lands in the quarantine.

use inflector::Inflector;

use crate::analysis::FilePlan;

/// Emit the `Store` aggregate for one input file.
pub fn emit_store(out: &mut String, plan: &FilePlan) {
    let fields = plan
        .tables
        .iter()
        .map(|table| {
            (
                table.message_name.to_snake_case(),
                table.message_name.clone(),
                table.message_name.to_screaming_snake_case(),
            )
        })
        .collect::<Vec<_>>();

    out.push_str("/// Aggregated handle over every generated table in this file.\n");
    out.push_str("pub struct Store<'a> {\n    conn: &'a ::rusqlite::Connection,\n");
    for (field, message, _) in &fields {
        out.push_str(&format!("    pub {field}: {message}Table<'a>,\n"));
    }
    out.push_str("}\n\n");

    out.push_str("impl<'a> Store<'a> {\n    pub fn new(conn: &'a ::rusqlite::Connection) -> Self {\n        Self {\n            conn,\n");
    for (field, message, _) in &fields {
        out.push_str(&format!("            {field}: {message}Table::new(conn),\n"));
    }
    out.push_str("        }\n    }\n\n");

    out.push_str("    /// Create the core tables and initialize every generated table.\n    pub fn init(&self) -> ::proprdb_rt::Result<()> {\n        ::proprdb_rt::schema::ensure_core_tables(self.conn)?;\n");
    for (field, _, _) in &fields {
        out.push_str(&format!("        self.{field}.init()?;\n"));
    }
    out.push_str("        Ok(())\n    }\n\n");

    out.push_str("    /// A defensive copy of the table catalog.\n    pub fn table_descriptors(&self) -> Vec<::proprdb_rt::TableDescriptor> {\n        vec![\n");
    for (table, (_, _, consts)) in plan.tables.iter().zip(&fields) {
        out.push_str(&format!(
            "            ::proprdb_rt::TableDescriptor {{\n                table_name: {consts}_TABLE_NAME.to_string(),\n                type_name: {consts}_TYPE_NAME.to_string(),\n                is_core: false,\n                sync_enabled: {},\n            }},\n",
            !table.omit_sync
        ));
    }
    out.push_str("        ]\n    }\n\n");

    // read_jsonl
    out.push_str(
        "    /// Import interchange records, dispatching by `@type`. Unknown types\n    /// are quarantined; records for sync-disabled types are skipped.\n    pub fn read_jsonl(\n        &self,\n        remote: &str,\n        reader: impl ::std::io::Read,\n    ) -> ::proprdb_rt::Result<()> {\n        let mut unknown_seen = false;\n        ::proprdb_rt::jsonl::read_jsonl(reader, |record, line| {\n            let type_name = match ::proprdb_rt::envelope::type_name_from_any_json(&record.data) {\n                Ok(type_name) => type_name,\n                Err(error) => {\n                    ::tracing::warn!(line, %error, \"skipping record without usable @type\");\n                    return Ok(());\n                }\n            };\n            match type_name.as_str() {\n",
    );
    for (table, (field, _, consts)) in plan.tables.iter().zip(&fields) {
        if table.omit_sync {
            out.push_str(&format!(
                "                {consts}_TYPE_NAME => {{\n                    ::tracing::warn!(\n                        line,\n                        id = %record.id,\n                        \"skipping record for sync-disabled type {}\"\n                    );\n                    Ok(())\n                }}\n",
                table.type_name
            ));
        } else {
            out.push_str(&format!(
                "                {consts}_TYPE_NAME => self.{field}.apply_record(&record, remote),\n"
            ));
        }
    }
    out.push_str(
        "                _ => {\n                    unknown_seen = true;\n                    ::proprdb_rt::unknown::insert(self.conn, &type_name, &record)\n                }\n            }\n        })?;\n        if unknown_seen {\n            ::proprdb_rt::unknown::compact_latest(self.conn)?;\n        }\n        Ok(())\n    }\n\n",
    );

    // write_jsonl
    out.push_str(
        "    /// Export every sync-enabled table's rows and tombstones newer than\n    /// the remote's watermark.\n    pub fn write_jsonl(\n        &self,\n        remote: &str,\n        writer: &mut dyn ::std::io::Write,\n    ) -> ::proprdb_rt::Result<()> {\n",
    );
    for (table, (field, _, _)) in plan.tables.iter().zip(&fields) {
        if !table.omit_sync {
            out.push_str(&format!("        self.{field}.write_jsonl(remote, writer)?;\n"));
        }
    }
    out.push_str("        Ok(())\n    }\n}\n");
}
