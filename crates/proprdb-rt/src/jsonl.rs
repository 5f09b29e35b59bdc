//! JSON-lines interchange records.
//!
//! One JSON object per line, UTF-8. Ordering within a stream carries no
//! meaning; conflict resolution is purely by `atNs`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProprError, Result};

/// A single interchange record.
///
/// `deleted` is omitted on the wire when false. `data` is a typed JSON
/// envelope; deletion records may carry a type-only envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    #[serde(rename = "atNs")]
    pub at_ns: i64,
    pub data: Value,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Stream records out of `reader` until EOF, calling `visit` with each
/// record and its 1-based ordinal. A record that fails to decode aborts the
/// stream with a line-numbered diagnostic; errors from `visit` propagate.
pub fn read_jsonl<R: Read>(
    reader: R,
    mut visit: impl FnMut(JsonlRecord, usize) -> Result<()>,
) -> Result<()> {
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<JsonlRecord>();
    for (index, item) in stream.enumerate() {
        let line = index + 1;
        let record = item.map_err(|e| ProprError::Interchange {
            line,
            message: e.to_string(),
        })?;
        visit(record, line)?;
    }
    Ok(())
}

/// Write one record as a single JSON line.
pub fn write_record<W: Write + ?Sized>(writer: &mut W, record: &JsonlRecord) -> Result<()> {
    serde_json::to_writer(&mut *writer, record)
        .map_err(|e| ProprError::Serialization(e.to_string()))?;
    writer.write_all(b"\n")?;
    Ok(())
}
