//! HTTP handlers for the books module, mounted under `/api/books`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use libris_http::error::AppError;
use serde::Deserialize;

use super::models::{Book, BookInput, BookList, DeleteConfirmation};
use super::service::BookService;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

pub fn router(service: BookService) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/{id}/borrow", patch(borrow_book))
        .route("/{id}/return", patch(return_book))
        .with_state(service)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(
    State(service): State<BookService>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<BookList>, AppError> {
    let Query(params) = params?;
    let list = service.list_books(params.status.as_deref()).await?;
    Ok(Json(list))
}

async fn get_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get_book(&id).await?))
}

async fn create_book(
    State(service): State<BookService>,
    body: Result<Json<BookInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(input) = body?;
    let book = service.create_book(&input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
    body: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let Json(input) = body?;
    Ok(Json(service.update_book(&id, &input).await?))
}

async fn borrow_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.borrow_book(&id).await?))
}

async fn return_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.return_book(&id).await?))
}

async fn delete_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    Ok(Json(service.delete_book(&id).await?))
}
