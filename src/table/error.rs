use thiserror::Error;

use crate::btree::TreeError;
use crate::value::Value;

/// Errors raised by table operations
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column {0} not found")]
    ColumnNotFound(String),

    #[error("Record has {actual} fields, but table has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Record with primary key {0} already exists")]
    DuplicateKey(Value),

    #[error("Cannot update primary key column {0}")]
    ImmutablePrimaryKey(String),

    #[error("Primary key {0} not in columns")]
    PrimaryKeyNotInColumns(String),

    #[error("Index error: {0}")]
    Tree(#[from] TreeError),
}

pub type TableResult<T> = Result<T, TableError>;
