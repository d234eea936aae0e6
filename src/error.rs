use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("failed to load document '{locator}': {reason}")]
    Load { locator: String, reason: String },

    #[error("analysis of '{locator}' produced no embedding")]
    EmptyAnalysis { locator: String },

    #[error("no documents survived analysis; nothing to index")]
    EmptyCollection,

    #[error("no documents indexed; build the index before querying")]
    IndexUnavailable,

    #[error("persisted index at {path} is corrupt: {reason}")]
    PersistenceCorrupt { path: PathBuf, reason: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
