//! Input checks for catalog operations. Pure functions, no store access.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::BookError;
use super::models::{BookId, BookInput, BookStatus, NewBook};

static ISBN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{10}(?:[0-9]{3})?$").expect("ISBN pattern is a valid regex")
});

/// Parse a path id; it must be a positive integer.
pub fn validate_id(raw: &str) -> Result<BookId, BookError> {
    match raw.trim().parse::<BookId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(BookError::validation("Invalid book ID")),
    }
}

/// Require non-blank title, author and isbn. Title and author come back trimmed.
pub fn validate_book_data(input: &BookInput) -> Result<NewBook, BookError> {
    fn required(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    match (
        required(&input.title),
        required(&input.author),
        required(&input.isbn),
    ) {
        (Some(title), Some(author), Some(isbn)) => Ok(NewBook {
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.to_string(),
        }),
        _ => Err(BookError::validation("Title, author, and ISBN are required")),
    }
}

/// Strip hyphens and whitespace, then require exactly 10 or 13 digits.
/// Returns the normalized ISBN.
pub fn validate_isbn(isbn: &str) -> Result<String, BookError> {
    let normalized = normalize_isbn(isbn);
    if ISBN_PATTERN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(BookError::validation("Invalid ISBN format"))
    }
}

pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// `None`, empty and `all` mean no filter.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<BookStatus>, BookError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse::<BookStatus>()
            .map(Some)
            .map_err(|_| BookError::validation("Invalid status filter")),
    }
}
