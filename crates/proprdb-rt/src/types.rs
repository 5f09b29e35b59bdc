/// Catalog entry for one materialized table, as computed by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table_name: String,
    /// Fully-qualified protobuf type name; empty for core tables.
    pub type_name: String,
    pub is_core: bool,
    pub sync_enabled: bool,
}

/// Introspection result for one table.
#[derive(Debug, Clone)]
pub struct TableStats {
    pub descriptor: TableDescriptor,
    pub object_count: i64,
    pub disk_usage_bytes: i64,
}
