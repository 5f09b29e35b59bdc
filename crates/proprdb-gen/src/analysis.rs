//! Descriptor analysis: from annotated message descriptors to table plans.
//!
//! The plan is the single input to the emitters. Everything here iterates
//! descriptors in declaration order so emission is byte-stable across runs.

use std::collections::HashSet;

use inflector::Inflector;
use prost_reflect::{DescriptorPool, DynamicMessage, ExtensionDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto};
use sha2::{Digest, Sha256};

use crate::error::{GenError, Result};

/// The closed set of projectable scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    Bool,
    Bytes,
}

impl ScalarKind {
    fn from_type(field_type: Type) -> Option<ScalarKind> {
        match field_type {
            Type::String => Some(ScalarKind::String),
            Type::Int32 | Type::Sint32 | Type::Sfixed32 => Some(ScalarKind::Int32),
            Type::Int64 | Type::Sint64 | Type::Sfixed64 => Some(ScalarKind::Int64),
            Type::Uint32 | Type::Fixed32 => Some(ScalarKind::Uint32),
            Type::Uint64 | Type::Fixed64 => Some(ScalarKind::Uint64),
            Type::Float => Some(ScalarKind::Float),
            Type::Double => Some(ScalarKind::Double),
            Type::Bool => Some(ScalarKind::Bool),
            Type::Bytes => Some(ScalarKind::Bytes),
            _ => None,
        }
    }

    /// The SQLite column type this kind projects to.
    pub fn sql_type(self) -> &'static str {
        match self {
            ScalarKind::String => "TEXT",
            ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::Uint32
            | ScalarKind::Uint64
            | ScalarKind::Bool => "INTEGER",
            ScalarKind::Float | ScalarKind::Double => "REAL",
            ScalarKind::Bytes => "BLOB",
        }
    }

    /// The default used for non-optional columns.
    pub fn sql_default(self) -> &'static str {
        match self {
            ScalarKind::String => "''",
            ScalarKind::Bytes => "X''",
            _ => "0",
        }
    }
}

fn type_token(field_type: Type) -> &'static str {
    match field_type {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Group => "group",
        Type::Message => "message",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Enum => "enum",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
    }
}

/// One projected column: a scalar `external` field mirrored into SQL.
#[derive(Debug, Clone)]
pub struct ProjectedColumn {
    /// Proto field name, doubling as the column name.
    pub field_name: String,
    /// Proto type token, as recorded in the projection schema string.
    pub type_token: &'static str,
    pub kind: ScalarKind,
    /// Explicit presence: the column is nullable and the payload field is an
    /// `Option` on the Rust side.
    pub optional: bool,
}

/// One managed index.
#[derive(Debug, Clone)]
pub struct IndexPlan {
    pub index_name: String,
    pub fields: Vec<String>,
}

/// Everything the emitters need to know about one materialized message.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub message_name: String,
    pub type_name: String,
    pub table_name: String,
    pub omit_sync: bool,
    pub validate_write: bool,
    pub allow_custom_id_insert: bool,
    pub columns: Vec<ProjectedColumn>,
    pub indexes: Vec<IndexPlan>,
}

impl TablePlan {
    /// The prefix owned by the generator for this table's indexes.
    pub fn index_prefix(&self) -> String {
        format!("idx_{}__", self.table_name)
    }

    /// Human-readable projection schema, also the first half of the hash
    /// pre-image: `name:token[:optional]` entries joined with `;`.
    pub fn projection_schema(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                if column.optional {
                    format!("{}:{}:optional", column.field_name, column.type_token)
                } else {
                    format!("{}:{}", column.field_name, column.type_token)
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Deterministic hash over the projection schema and index set. Stored
    /// in `_proprdb_schema`; a mismatch at init triggers reprojection.
    pub fn schema_hash(&self) -> String {
        let index_part = self
            .indexes
            .iter()
            .map(|index| format!("{}:{}", index.index_name, index.fields.join(",")))
            .collect::<Vec<_>>()
            .join(";");
        let pre_image = format!("{}|{}", self.projection_schema(), index_part);
        let digest = Sha256::digest(pre_image.as_bytes());
        format!("{digest:x}")
    }
}

/// The analyzed contents of one input file.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub file_name: String,
    pub tables: Vec<TablePlan>,
}

struct OptionExtensions {
    external: Option<ExtensionDescriptor>,
    omit_table: Option<ExtensionDescriptor>,
    omit_sync: Option<ExtensionDescriptor>,
    validate_write: Option<ExtensionDescriptor>,
    allow_custom_id_insert: Option<ExtensionDescriptor>,
    indexes: Option<ExtensionDescriptor>,
}

impl OptionExtensions {
    fn resolve(pool: &DescriptorPool) -> Self {
        Self {
            external: pool.get_extension_by_name("proprdb.external"),
            omit_table: pool.get_extension_by_name("proprdb.omit_table"),
            omit_sync: pool.get_extension_by_name("proprdb.omit_sync"),
            validate_write: pool.get_extension_by_name("proprdb.validate_write"),
            allow_custom_id_insert: pool.get_extension_by_name("proprdb.allow_custom_id_insert"),
            indexes: pool.get_extension_by_name("proprdb.indexes"),
        }
    }
}

fn bool_extension(options: &DynamicMessage, extension: &Option<ExtensionDescriptor>) -> bool {
    extension
        .as_ref()
        .map(|extension| options.get_extension(extension).as_bool().unwrap_or(false))
        .unwrap_or(false)
}

fn index_specs(options: &DynamicMessage, extension: &Option<ExtensionDescriptor>) -> Vec<Vec<String>> {
    let Some(extension) = extension.as_ref() else {
        return Vec::new();
    };
    let value = options.get_extension(extension);
    let Some(items) = value.as_list() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| item.as_message())
        .map(|spec| {
            spec.get_field_by_name("fields")
                .and_then(|fields| {
                    fields.as_list().map(|list| {
                        list.iter()
                            .filter_map(|field| field.as_str().map(str::to_string))
                            .collect()
                    })
                })
                .unwrap_or_default()
        })
        .collect()
}

/// Analyze one file of the compiler request into table plans.
///
/// Messages are visited in declaration order; `omit_table` messages are
/// skipped entirely. Validation failures abort with a diagnostic naming the
/// file and the offending message or field.
pub fn analyze_file(pool: &DescriptorPool, file_name: &str) -> Result<FilePlan> {
    let file = pool
        .get_file_by_name(file_name)
        .ok_or_else(|| GenError::MissingFile(file_name.to_string()))?;
    let proto = file.file_descriptor_proto();
    let package = proto.package().to_string();
    let extensions = OptionExtensions::resolve(pool);

    let mut tables = Vec::new();
    let mut seen_tables = HashSet::new();
    for message in &proto.message_type {
        let Some(plan) = analyze_message(pool, &extensions, file_name, &package, message)? else {
            continue;
        };
        if !seen_tables.insert(plan.table_name.clone()) {
            return Err(GenError::DuplicateTable {
                file: file_name.to_string(),
                table: plan.table_name,
            });
        }
        tables.push(plan);
    }

    Ok(FilePlan {
        file_name: file_name.to_string(),
        tables,
    })
}

fn analyze_message(
    pool: &DescriptorPool,
    extensions: &OptionExtensions,
    file_name: &str,
    package: &str,
    message: &DescriptorProto,
) -> Result<Option<TablePlan>> {
    let message_name = message.name().to_string();
    let type_name = if package.is_empty() {
        message_name.clone()
    } else {
        format!("{package}.{message_name}")
    };

    // Option lookups go through the reflective descriptors; the pool was
    // decoded from the raw request bytes, so extension values survive.
    let reflect_message = pool.get_message_by_name(&type_name);
    let message_options = reflect_message
        .as_ref()
        .map(|descriptor| descriptor.options());

    let message_bool = |extension: &Option<ExtensionDescriptor>| {
        message_options
            .as_ref()
            .map(|options| bool_extension(options, extension))
            .unwrap_or(false)
    };

    if message_bool(&extensions.omit_table) {
        return Ok(None);
    }

    let table_name = if package.is_empty() {
        message_name.to_snake_case()
    } else {
        format!("{}_{}", package.replace('.', "_"), message_name.to_snake_case())
    };

    let mut columns = Vec::new();
    for field in &message.field {
        let external = reflect_message
            .as_ref()
            .and_then(|descriptor| descriptor.get_field_by_name(field.name()))
            .map(|descriptor| bool_extension(&descriptor.options(), &extensions.external))
            .unwrap_or(false);
        if !external {
            continue;
        }
        columns.push(projected_column(file_name, &message_name, field)?);
    }

    let mut indexes = Vec::new();
    let specs = message_options
        .as_ref()
        .map(|options| index_specs(options, &extensions.indexes))
        .unwrap_or_default();
    for fields in specs {
        if fields.is_empty() {
            return Err(GenError::EmptyIndex {
                file: file_name.to_string(),
                message: message_name.clone(),
            });
        }
        for field_name in &fields {
            let exists = message.field.iter().any(|field| field.name() == *field_name);
            if !exists {
                return Err(GenError::UnknownIndexField {
                    file: file_name.to_string(),
                    message: message_name.clone(),
                    field: field_name.clone(),
                });
            }
            let projected = columns.iter().any(|column| column.field_name == *field_name);
            if !projected {
                return Err(GenError::NonExternalIndexField {
                    file: file_name.to_string(),
                    message: message_name.clone(),
                    field: field_name.clone(),
                });
            }
        }
        let index_name = format!("idx_{}__{}", table_name, fields.join("_"));
        indexes.push(IndexPlan { index_name, fields });
    }

    Ok(Some(TablePlan {
        message_name,
        type_name,
        table_name,
        omit_sync: message_bool(&extensions.omit_sync),
        validate_write: message_bool(&extensions.validate_write),
        allow_custom_id_insert: message_bool(&extensions.allow_custom_id_insert),
        columns,
        indexes,
    }))
}

fn projected_column(
    file_name: &str,
    message_name: &str,
    field: &FieldDescriptorProto,
) -> Result<ProjectedColumn> {
    let unsupported = |kind: String| GenError::UnsupportedProjection {
        file: file_name.to_string(),
        message: message_name.to_string(),
        field: field.name().to_string(),
        kind,
    };
    if field.label() == Label::Repeated {
        return Err(unsupported(format!("repeated {}", type_token(field.r#type()))));
    }
    let kind = ScalarKind::from_type(field.r#type())
        .ok_or_else(|| unsupported(type_token(field.r#type()).to_string()))?;
    Ok(ProjectedColumn {
        field_name: field.name().to_string(),
        type_token: type_token(field.r#type()),
        kind,
        optional: field.proto3_optional(),
    })
}
