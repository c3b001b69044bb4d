use super::models::BookInput;

/// Starter catalog inserted into an empty database.
pub fn sample_books() -> Vec<BookInput> {
    [
        ("The Great Gatsby", "F. Scott Fitzgerald", "9780743273565"),
        ("To Kill a Mockingbird", "Harper Lee", "9780061120084"),
        ("1984", "George Orwell", "9780451524935"),
        ("Pride and Prejudice", "Jane Austen", "9780141439518"),
        ("The Catcher in the Rye", "J.D. Salinger", "9780316769174"),
    ]
    .into_iter()
    .map(|(title, author, isbn)| BookInput::new(title, author, isbn))
    .collect()
}
