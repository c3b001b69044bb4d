use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{BookStore, StoreError};
use crate::modules::books::models::{Book, BookId, BookStatus, NewBook, Statistics};

#[derive(Debug, Default)]
struct Inner {
    last_id: BookId,
    books: BTreeMap<BookId, Book>,
}

impl Inner {
    fn isbn_taken(&self, isbn: &str, except: Option<BookId>) -> bool {
        self.books
            .values()
            .any(|book| book.isbn == isbn && Some(book.id) != except)
    }
}

/// Process-local `BookStore` with the same guarantees as the SQLite one.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    inner: RwLock<Inner>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn find_all(&self, status: Option<BookStatus>) -> Result<Vec<Book>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .books
            .values()
            .rev()
            .filter(|book| status.map_or(true, |status| book.status == status))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.inner.read().await.books.get(&id).cloned())
    }

    async fn create(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.isbn_taken(&book.isbn, None) {
            return Err(StoreError::UniqueViolation);
        }

        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: inner.last_id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            status: BookStatus::Available,
            created_at: now,
            updated_at: now,
        };
        inner.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, book: NewBook) -> Result<Option<Book>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.books.contains_key(&id) {
            return Ok(None);
        }
        if inner.isbn_taken(&book.isbn, Some(id)) {
            return Err(StoreError::UniqueViolation);
        }

        Ok(inner.books.get_mut(&id).map(|existing| {
            existing.title = book.title;
            existing.author = book.author;
            existing.isbn = book.isbn;
            existing.updated_at = OffsetDateTime::now_utc();
            existing.clone()
        }))
    }

    async fn update_status(
        &self,
        id: BookId,
        from: BookStatus,
        to: BookStatus,
    ) -> Result<Option<Book>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .books
            .get_mut(&id)
            .filter(|book| book.status == from)
            .map(|book| {
                book.status = to;
                book.updated_at = OffsetDateTime::now_utc();
                book.clone()
            }))
    }

    async fn delete(&self, id: BookId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let available = inner
            .books
            .get(&id)
            .is_some_and(|book| book.status == BookStatus::Available);
        if available {
            inner.books.remove(&id);
        }
        Ok(available)
    }

    async fn statistics(&self) -> Result<Statistics, StoreError> {
        let inner = self.inner.read().await;
        let mut statistics = Statistics::default();
        for book in inner.books.values() {
            statistics.record(book.status, 1);
        }
        Ok(statistics)
    }
}
