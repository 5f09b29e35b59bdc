//! proprdb-rt: runtime library for proprdb generated storage modules
//!
//! A proprdb store is a set of per-type SQLite tables generated by
//! `protoc-gen-proprdb`, plus the core tables this crate bootstraps:
//! - `_deleted`: tombstones that suppress resurrection by older updates
//! - `_sync`: per-remote high watermarks for JSONL export
//! - `_proprdb_schema`: projection schema hashes for drift detection
//! - `_unknown_types`: quarantine for inbound records of unknown type
//!
//! The generated modules call into the generic algorithms here: UUIDv7
//! allocation, last-writer-wins reconciliation by `at_ns`, tombstone
//! handling, watermark tracking, typed-Any JSON envelope parsing,
//! quarantine compaction and replay, and the managed-index lifecycle.
//!
//! The runtime holds no connections of its own. Every operation runs over a
//! caller-supplied `rusqlite::Connection` (a `rusqlite::Transaction` derefs
//! to one), so multi-statement actions are atomic exactly when the caller
//! wraps them in a transaction.

pub mod envelope;
pub mod error;
pub mod id;
pub mod index;
pub mod introspect;
pub mod jsonl;
pub mod schema;
pub mod sync;
pub mod tombstone;
pub mod types;
pub mod unknown;

pub use envelope::{Payload, ValidateWrite, TYPE_URL_PREFIX};
pub use error::{ProprError, Result};
pub use jsonl::JsonlRecord;
pub use schema::{
    ensure_core_tables, quote_identifier, CORE_TABLE_DELETED, CORE_TABLE_SCHEMA_STATE,
    CORE_TABLE_SYNC, CORE_TABLE_UNKNOWN,
};
pub use types::{TableDescriptor, TableStats};
