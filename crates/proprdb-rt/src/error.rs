use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProprError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{operation}: {source}")]
    Storage {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid uuid {0:?}")]
    InvalidUuid(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("decode {type_name} payload: {message}")]
    Decode { type_name: String, message: String },

    #[error("decode jsonl line {line}: {message}")]
    Interchange { line: usize, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("empty @type in data envelope")]
    MissingType,

    #[error("no row or tombstone for {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ProprError>;

impl ProprError {
    /// Build a closure that wraps a storage failure with `(operation, key)`
    /// context, for use with `map_err` at every call into the store.
    pub fn storage(operation: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> ProprError {
        let operation = operation.into();
        move |source| ProprError::Storage { operation, source }
    }

    pub fn decode(type_name: impl Into<String>, message: impl ToString) -> ProprError {
        ProprError::Decode {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }
}
