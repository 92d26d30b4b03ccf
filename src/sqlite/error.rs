use thiserror::Error;

/// Failures raised while decoding the database file.
///
/// The low-level decoders bubble these up unchanged; the schema walker
/// and the executor decide per call site whether a failure aborts the
/// command or only skips the offending cell or table.
#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("invalid database header field {field}: {value}")]
    InvalidHeader { field: &'static str, value: String },

    #[error("unknown page kind: {0}")]
    InvalidPageKind(u8),

    #[error("short read: wanted {want} bytes, got {got}")]
    ShortRead { want: usize, got: usize },

    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("no column {column:?} on table {table:?}")]
    UnknownColumn { table: String, column: String },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unsupported serial type: {0}")]
    UnsupportedSerialType(i64),
}

pub type Result<T, E = SqliteError> = std::result::Result<T, E>;
