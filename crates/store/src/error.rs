use common::BookId;
use thiserror::Error;

/// Errors that can occur when interacting with the marketplace store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted row holds a value the domain cannot represent.
    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    /// Adding to a cart line would overflow its quantity.
    #[error("Quantity for book {0} exceeds the supported range")]
    QuantityOutOfRange(BookId),

    /// The book is still referenced by order items and cannot be removed.
    #[error("Book {0} is referenced by existing orders")]
    BookReferenced(BookId),
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        StoreError::Corrupt {
            table,
            detail: detail.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
