//! Persistence contract for books.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Book, BookId, BookStatus, NewBook, Statistics};

mod memory;
mod sqlite;

pub use memory::InMemoryBookStore;
pub use sqlite::SqliteBookStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another book already uses this ISBN
    #[error("unique constraint violated on books.isbn")]
    UniqueViolation,

    /// A stored row could not be turned into a `Book`
    #[error("corrupt book record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Backing collection of books with a unique ISBN constraint.
///
/// Every method is a single atomic operation on the store; callers compose
/// them without transactions.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Books matching `status` (all when `None`), newest first
    async fn find_all(&self, status: Option<BookStatus>) -> Result<Vec<Book>, StoreError>;

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// Insert an available book and return it with its assigned id
    async fn create(&self, book: NewBook) -> Result<Book, StoreError>;

    /// Overwrite title, author and isbn. `None` when the book does not exist.
    async fn update(&self, id: BookId, book: NewBook) -> Result<Option<Book>, StoreError>;

    /// Move the book from `from` to `to`. `None` when no book with that id
    /// currently has status `from`.
    async fn update_status(
        &self,
        id: BookId,
        from: BookStatus,
        to: BookStatus,
    ) -> Result<Option<Book>, StoreError>;

    /// Remove the book if it is available. `false` when nothing was removed.
    async fn delete(&self, id: BookId) -> Result<bool, StoreError>;

    /// Counts over the whole collection
    async fn statistics(&self) -> Result<Statistics, StoreError>;
}
