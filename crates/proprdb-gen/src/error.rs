use thiserror::Error;

/// Generation failures. All of these are fatal to the plugin run and
/// surface through the compiler's plugin error channel.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("decode code generator request: {0}")]
    Request(String),

    #[error("build descriptor pool: {0}")]
    Descriptor(String),

    #[error("file {0} is not part of the compiler request")]
    MissingFile(String),

    #[error("{file}: index on message {message} must include at least one field")]
    EmptyIndex { file: String, message: String },

    #[error("{file}: index field {field:?} on message {message} does not exist")]
    UnknownIndexField {
        file: String,
        message: String,
        field: String,
    },

    #[error("{file}: index field {field:?} on message {message} must be marked (proprdb.external) = true")]
    NonExternalIndexField {
        file: String,
        message: String,
        field: String,
    },

    #[error("{file}: field {field:?} on message {message} is {kind} and cannot be projected")]
    UnsupportedProjection {
        file: String,
        message: String,
        field: String,
        kind: String,
    },

    #[error("{file}: table name {table} is generated by more than one message")]
    DuplicateTable { file: String, table: String },
}

pub type Result<T> = std::result::Result<T, GenError>;
