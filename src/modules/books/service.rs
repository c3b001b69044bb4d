use std::sync::Arc;

use super::error::BookError;
use super::models::{
    Book, BookId, BookInput, BookList, BookStatus, DeleteConfirmation, NewBook,
};
use super::store::BookStore;
use super::validation;

/// Catalog operations: validation, store calls and status-transition rules.
///
/// Ids arrive as raw strings and are validated here. Borrow, return and
/// delete apply their guard in the same store statement that performs the
/// change, so two concurrent borrows of one book cannot both succeed.
#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    /// Books matching the optional status filter, plus counts over the whole catalog.
    pub async fn list_books(&self, status_filter: Option<&str>) -> Result<BookList, BookError> {
        let status = validation::parse_status_filter(status_filter)?;

        let books = self.store.find_all(status).await?;
        let statistics = self.store.statistics().await?;

        Ok(BookList { books, statistics })
    }

    pub async fn get_book(&self, id: &str) -> Result<Book, BookError> {
        let id = validation::validate_id(id)?;
        self.find(id).await
    }

    pub async fn create_book(&self, input: &BookInput) -> Result<Book, BookError> {
        let book = validated(input)?;

        let created = self.store.create(book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "book created");
        Ok(created)
    }

    /// Overwrite title, author and isbn. Status is left as it is.
    pub async fn update_book(&self, id: &str, input: &BookInput) -> Result<Book, BookError> {
        let id = validation::validate_id(id)?;
        let book = validated(input)?;

        self.find(id).await?;

        let updated = self
            .store
            .update(id, book)
            .await?
            .ok_or_else(BookError::not_found)?;
        tracing::info!(book_id = updated.id, "book updated");
        Ok(updated)
    }

    pub async fn borrow_book(&self, id: &str) -> Result<Book, BookError> {
        self.transition(
            id,
            BookStatus::Available,
            BookStatus::Borrowed,
            "Book is already borrowed",
        )
        .await
    }

    pub async fn return_book(&self, id: &str) -> Result<Book, BookError> {
        self.transition(
            id,
            BookStatus::Borrowed,
            BookStatus::Available,
            "Book is not borrowed",
        )
        .await
    }

    pub async fn delete_book(&self, id: &str) -> Result<DeleteConfirmation, BookError> {
        const BORROWED: &str = "Cannot delete a borrowed book";

        let book = self.get_book(id).await?;
        if book.status == BookStatus::Borrowed {
            return Err(BookError::validation(BORROWED));
        }

        if !self.store.delete(book.id).await? {
            return Err(self.lost_race(book.id, BORROWED).await);
        }

        tracing::info!(book_id = book.id, "book deleted");
        Ok(DeleteConfirmation::new(book.id))
    }

    /// Insert `samples` when the catalog is empty. Returns how many were added.
    pub async fn seed_catalog(&self, samples: &[BookInput]) -> Result<usize, BookError> {
        if self.store.statistics().await?.total > 0 {
            tracing::debug!("catalog already populated; skipping sample data");
            return Ok(0);
        }

        for sample in samples {
            self.create_book(sample).await?;
        }

        tracing::info!(count = samples.len(), "sample books inserted");
        Ok(samples.len())
    }

    async fn find(&self, id: BookId) -> Result<Book, BookError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(BookError::not_found)
    }

    async fn transition(
        &self,
        id: &str,
        from: BookStatus,
        to: BookStatus,
        rejection: &'static str,
    ) -> Result<Book, BookError> {
        let book = self.get_book(id).await?;
        if book.status != from {
            return Err(BookError::validation(rejection));
        }

        match self.store.update_status(book.id, from, to).await? {
            Some(updated) => {
                tracing::info!(book_id = updated.id, status = %updated.status, "book status changed");
                Ok(updated)
            }
            None => Err(self.lost_race(book.id, rejection).await),
        }
    }

    /// Classify a guarded write that matched no row: the book was either
    /// removed or moved to another status after it was read.
    async fn lost_race(&self, id: BookId, rejection: &'static str) -> BookError {
        tracing::debug!(book_id = id, "book changed concurrently");
        match self.store.find_by_id(id).await {
            Ok(Some(_)) => BookError::validation(rejection),
            Ok(None) => BookError::not_found(),
            Err(err) => err.into(),
        }
    }
}

fn validated(input: &BookInput) -> Result<NewBook, BookError> {
    let mut book = validation::validate_book_data(input)?;
    book.isbn = validation::validate_isbn(&book.isbn)?;
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::Statistics;
    use crate::modules::books::store::{InMemoryBookStore, StoreError};
    use async_trait::async_trait;
    use std::time::Duration;

    fn service() -> BookService {
        BookService::new(Arc::new(InMemoryBookStore::new()))
    }

    fn dune() -> BookInput {
        BookInput::new("Dune", "Herbert", "9780441013593")
    }

    fn assert_validation<T: std::fmt::Debug>(result: Result<T, BookError>, expected: &str) {
        match result {
            Err(BookError::Validation(message)) => assert_eq!(message, expected),
            other => panic!("expected validation error '{}', got {:?}", expected, other),
        }
    }

    fn assert_not_found<T: std::fmt::Debug>(result: Result<T, BookError>) {
        assert!(
            matches!(result, Err(BookError::NotFound(ref message)) if message == "Book not found"),
            "expected not found, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn lending_lifecycle() {
        let service = service();

        let book = service.create_book(&dune()).await.unwrap();
        assert_eq!(book.status, BookStatus::Available);
        assert!(book.id > 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let borrowed = service.borrow_book(&book.id.to_string()).await.unwrap();
        assert_eq!(borrowed.status, BookStatus::Borrowed);
        assert!(borrowed.updated_at > book.updated_at);

        assert_validation(
            service.borrow_book(&book.id.to_string()).await,
            "Book is already borrowed",
        );

        let returned = service.return_book(&book.id.to_string()).await.unwrap();
        assert_eq!(returned.status, BookStatus::Available);

        let confirmation = service.delete_book(&book.id.to_string()).await.unwrap();
        assert_eq!(confirmation, DeleteConfirmation::new(book.id));
        assert_not_found(service.get_book(&book.id.to_string()).await);
    }

    #[tokio::test]
    async fn return_requires_a_borrowed_book() {
        let service = service();
        let book = service.create_book(&dune()).await.unwrap();

        assert_validation(
            service.return_book(&book.id.to_string()).await,
            "Book is not borrowed",
        );
    }

    #[tokio::test]
    async fn borrowed_book_cannot_be_deleted() {
        let service = service();
        let book = service.create_book(&dune()).await.unwrap();
        service.borrow_book(&book.id.to_string()).await.unwrap();

        assert_validation(
            service.delete_book(&book.id.to_string()).await,
            "Cannot delete a borrowed book",
        );
        assert!(service.get_book(&book.id.to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn isbn_conflicts_ignore_formatting() {
        let service = service();
        let first = service
            .create_book(&BookInput::new("Dune", "Herbert", "978-0-44-101359-3"))
            .await
            .unwrap();
        assert_eq!(first.isbn, "9780441013593");

        let err = service.create_book(&dune()).await.unwrap_err();
        assert!(matches!(err, BookError::Conflict(ref message) if message == "ISBN already exists"));
    }

    #[tokio::test]
    async fn create_validates_input() {
        let service = service();

        assert_validation(
            service
                .create_book(&BookInput::new("Dune", "Herbert", "123"))
                .await,
            "Invalid ISBN format",
        );
        assert_validation(
            service
                .create_book(&BookInput {
                    title: None,
                    ..dune()
                })
                .await,
            "Title, author, and ISBN are required",
        );
        assert_eq!(service.list_books(None).await.unwrap().books.len(), 0);
    }

    #[tokio::test]
    async fn update_overwrites_fields_but_not_status() {
        let service = service();
        let book = service.create_book(&dune()).await.unwrap();
        service.borrow_book(&book.id.to_string()).await.unwrap();

        let updated = service
            .update_book(
                &book.id.to_string(),
                &BookInput::new("Dune Messiah", "Frank Herbert", "0-441-17269-7"),
            )
            .await
            .unwrap();

        assert_eq!(updated.id, book.id);
        assert_eq!(updated.title, "Dune Messiah");
        assert_eq!(updated.isbn, "0441172697");
        assert_eq!(updated.status, BookStatus::Borrowed);
        assert_eq!(updated.created_at, book.created_at);
    }

    #[tokio::test]
    async fn update_reports_missing_book_and_isbn_collision() {
        let service = service();
        let dune = service.create_book(&dune()).await.unwrap();
        let messiah = service
            .create_book(&BookInput::new("Dune Messiah", "Herbert", "0441172697"))
            .await
            .unwrap();

        assert_not_found(
            service
                .update_book("999", &BookInput::new("Ghost", "Nobody", "0441172697"))
                .await,
        );

        let err = service
            .update_book(&messiah.id.to_string(), &BookInput::new("Dune", "Herbert", &dune.isbn))
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::Conflict(_)));

        // Keeping its own ISBN is not a collision
        service
            .update_book(
                &dune.id.to_string(),
                &BookInput::new("Dune (50th Anniversary)", "Herbert", &dune.isbn),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ids_are_validated_before_lookup() {
        let service = service();

        for id in ["abc", "0", "-1", ""] {
            assert_validation(service.get_book(id).await, "Invalid book ID");
            assert_validation(service.borrow_book(id).await, "Invalid book ID");
            assert_validation(service.delete_book(id).await, "Invalid book ID");
        }
        assert_not_found(service.borrow_book("42").await);
        assert_not_found(service.return_book("42").await);
        assert_not_found(service.delete_book("42").await);
    }

    #[tokio::test]
    async fn statistics_cover_the_full_catalog() {
        let service = service();
        let book = service.create_book(&dune()).await.unwrap();
        service
            .create_book(&BookInput::new("Dune Messiah", "Herbert", "0441172697"))
            .await
            .unwrap();
        service.borrow_book(&book.id.to_string()).await.unwrap();

        let borrowed = service.list_books(Some("borrowed")).await.unwrap();
        assert_eq!(borrowed.books.len(), 1);
        assert_eq!(
            borrowed.statistics,
            Statistics {
                total: 2,
                available: 1,
                borrowed: 1
            }
        );

        let all = service.list_books(Some("all")).await.unwrap();
        assert_eq!(all.books.len(), 2);

        assert_validation(service.list_books(Some("lost")).await, "Invalid status filter");
    }

    #[tokio::test]
    async fn seeding_only_fills_an_empty_catalog() {
        let service = service();
        let samples = crate::modules::books::seed::sample_books();

        assert_eq!(service.seed_catalog(&samples).await.unwrap(), samples.len());
        assert_eq!(service.seed_catalog(&samples).await.unwrap(), 0);
        assert_eq!(
            service.list_books(None).await.unwrap().statistics.total,
            samples.len() as u64
        );
    }

    /// Store whose guarded writes always lose to a concurrent writer.
    struct RacingStore {
        inner: InMemoryBookStore,
    }

    #[async_trait]
    impl BookStore for RacingStore {
        async fn find_all(&self, status: Option<BookStatus>) -> Result<Vec<Book>, StoreError> {
            self.inner.find_all(status).await
        }

        async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, book: NewBook) -> Result<Book, StoreError> {
            self.inner.create(book).await
        }

        async fn update(&self, id: BookId, book: NewBook) -> Result<Option<Book>, StoreError> {
            self.inner.update(id, book).await
        }

        async fn update_status(
            &self,
            id: BookId,
            from: BookStatus,
            to: BookStatus,
        ) -> Result<Option<Book>, StoreError> {
            // Another request performs the same transition first.
            self.inner.update_status(id, from, to).await?;
            self.inner.update_status(id, from, to).await
        }

        async fn delete(&self, id: BookId) -> Result<bool, StoreError> {
            self.inner.delete(id).await?;
            self.inner.delete(id).await
        }

        async fn statistics(&self) -> Result<Statistics, StoreError> {
            self.inner.statistics().await
        }
    }

    #[tokio::test]
    async fn concurrent_changes_are_reported_not_overwritten() {
        let service = BookService::new(Arc::new(RacingStore {
            inner: InMemoryBookStore::new(),
        }));
        let book = service.create_book(&dune()).await.unwrap();

        assert_validation(
            service.borrow_book(&book.id.to_string()).await,
            "Book is already borrowed",
        );
        assert_eq!(
            service.get_book(&book.id.to_string()).await.unwrap().status,
            BookStatus::Borrowed
        );

        let other = service
            .create_book(&BookInput::new("Dune Messiah", "Herbert", "0441172697"))
            .await
            .unwrap();
        assert_not_found(service.delete_book(&other.id.to_string()).await);
    }

    struct BrokenStore;

    #[async_trait]
    impl BookStore for BrokenStore {
        async fn find_all(&self, _: Option<BookStatus>) -> Result<Vec<Book>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_by_id(&self, _: BookId) -> Result<Option<Book>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn create(&self, _: NewBook) -> Result<Book, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn update(&self, _: BookId, _: NewBook) -> Result<Option<Book>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn update_status(
            &self,
            _: BookId,
            _: BookStatus,
            _: BookStatus,
        ) -> Result<Option<Book>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn delete(&self, _: BookId) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn statistics(&self) -> Result<Statistics, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_internal_errors() {
        let service = BookService::new(Arc::new(BrokenStore));

        assert!(matches!(
            service.create_book(&dune()).await,
            Err(BookError::Internal(_))
        ));
        assert!(matches!(
            service.list_books(None).await,
            Err(BookError::Internal(_))
        ));
        // Validation still runs before the store is touched
        assert_validation(service.get_book("nope").await, "Invalid book ID");
    }
}
