use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::{BookStore, StoreError};
use crate::modules::books::models::{Book, BookId, BookStatus, NewBook, Statistics};

const BOOK_COLUMNS: &str = "id, title, author, isbn, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    author: String,
    isbn: String,
    status: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<BookRow> for Book {
    type Error = StoreError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BookStatus>().map_err(StoreError::Corrupt)?;
        Ok(Book {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_book(row: Option<BookRow>) -> Result<Option<Book>, StoreError> {
    row.map(Book::try_from).transpose()
}

/// `BookStore` over the `books` table
#[derive(Debug, Clone)]
pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn find_all(&self, status: Option<BookStatus>) -> Result<Vec<Book>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, BookRow>(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books WHERE status = ? ORDER BY id DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, BookRow>(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books ORDER BY id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Book::try_from).collect()
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_book(row)
    }

    async fn create(&self, book: NewBook) -> Result<Book, StoreError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "INSERT INTO books (title, author, isbn, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(BookStatus::Available.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Book::try_from(row)
    }

    async fn update(&self, id: BookId, book: NewBook) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "UPDATE books SET title = ?, author = ?, isbn = ?, updated_at = ?
             WHERE id = ?
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_book(row)
    }

    async fn update_status(
        &self,
        id: BookId,
        from: BookStatus,
        to: BookStatus,
    ) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "UPDATE books SET status = ?, updated_at = ?
             WHERE id = ? AND status = ?
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(to.as_str())
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        into_book(row)
    }

    async fn delete(&self, id: BookId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ? AND status = ?")
            .bind(id)
            .bind(BookStatus::Available.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn statistics(&self) -> Result<Statistics, StoreError> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM books GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut statistics = Statistics::default();
        for (status, count) in counts {
            let status = status.parse::<BookStatus>().map_err(StoreError::Corrupt)?;
            statistics.record(status, u64::try_from(count).unwrap_or_default());
        }
        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteBookStore {
        let settings = libris_kernel::settings::DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let db = libris_db::Database::connect(&settings).await.unwrap();
        let migrations: Vec<(String, libris_kernel::Migration)> = crate::modules::books::migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        db.migrate(&migrations).await.unwrap();
        SqliteBookStore::new(db.pool().clone())
    }

    fn dune() -> NewBook {
        NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = store().await;

        let first = store.create(dune()).await.unwrap();
        let second = store
            .create(NewBook {
                isbn: "0441013597".to_string(),
                ..dune()
            })
            .await
            .unwrap();

        assert_eq!(first.status, BookStatus::Available);
        assert!(second.id > first.id);
        assert_eq!(store.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_unique_violation() {
        let store = store().await;
        let existing = store.create(dune()).await.unwrap();

        let err = store.create(dune()).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        let other = store
            .create(NewBook {
                isbn: "0441013597".to_string(),
                ..dune()
            })
            .await
            .unwrap();
        let err = store
            .update(other.id, dune())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
        assert_eq!(store.find_by_id(existing.id).await.unwrap().unwrap().isbn, existing.isbn);
    }

    #[tokio::test]
    async fn update_status_only_matches_expected_status() {
        let store = store().await;
        let book = store.create(dune()).await.unwrap();

        let borrowed = store
            .update_status(book.id, BookStatus::Available, BookStatus::Borrowed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(borrowed.status, BookStatus::Borrowed);
        assert!(borrowed.updated_at >= book.updated_at);

        let again = store
            .update_status(book.id, BookStatus::Available, BookStatus::Borrowed)
            .await
            .unwrap();
        assert!(again.is_none());

        assert!(!store.delete(book.id).await.unwrap());
        store
            .update_status(book.id, BookStatus::Borrowed, BookStatus::Available)
            .await
            .unwrap()
            .unwrap();
        assert!(store.delete(book.id).await.unwrap());
        assert!(store.find_by_id(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = store().await;
        let book = store.create(dune()).await.unwrap();
        assert!(store.delete(book.id).await.unwrap());

        let replacement = store.create(dune()).await.unwrap();
        assert!(replacement.id > book.id);
    }

    #[tokio::test]
    async fn statistics_and_filters_cover_the_collection() {
        let store = store().await;
        let first = store.create(dune()).await.unwrap();
        store
            .create(NewBook {
                isbn: "0441013597".to_string(),
                ..dune()
            })
            .await
            .unwrap();
        store
            .update_status(first.id, BookStatus::Available, BookStatus::Borrowed)
            .await
            .unwrap();

        let borrowed = store.find_all(Some(BookStatus::Borrowed)).await.unwrap();
        assert_eq!(borrowed.len(), 1);
        assert_eq!(borrowed[0].id, first.id);

        let all = store.find_all(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].id > all[1].id);

        assert_eq!(
            store.statistics().await.unwrap(),
            Statistics {
                total: 2,
                available: 1,
                borrowed: 1
            }
        );
    }

    #[tokio::test]
    async fn invalid_status_is_rejected_by_the_schema() {
        let store = store().await;
        let book = store.create(dune()).await.unwrap();

        let result = sqlx::query("UPDATE books SET status = 'lost' WHERE id = ?")
            .bind(book.id)
            .execute(&store.pool)
            .await;
        assert!(result.is_err());
    }
}
