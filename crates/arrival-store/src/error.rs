use thiserror::Error;

/// Errors that can occur within the workflow store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database file's directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be parsed back into its field type.
    #[error("Corrupt value for {key}: {value:?}")]
    Corrupt { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
