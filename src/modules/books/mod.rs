pub mod error;
pub mod models;
pub mod routes;
pub mod seed;
pub mod service;
pub mod store;
pub mod validation;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use service::BookService;
use store::BookStore;

/// Books module: the catalog API and its `books` table
pub struct BooksModule {
    service: BookService,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            service: BookService::new(store),
        }
    }
}

/// Schema owned by the books module
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_create_books",
        up: r#"
            CREATE TABLE IF NOT EXISTS books (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT NOT NULL CHECK (title <> ''),
                author     TEXT NOT NULL CHECK (author <> ''),
                isbn       TEXT NOT NULL UNIQUE,
                status     TEXT NOT NULL DEFAULT 'available'
                           CHECK (status IN ('available', 'borrowed')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS books_status ON books (status);
            "#,
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.database.seed_sample_data {
            let inserted = self
                .service
                .seed_catalog(&seed::sample_books())
                .await
                .context("failed to seed sample books")?;
            tracing::info!(module = self.name(), inserted, "sample data checked");
        }

        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module over the given store
pub fn create_module(store: Arc<dyn BookStore>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64", "minimum": 1 }
    })
}

fn book_body() -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookInput" }
            }
        }
    })
}

fn transition(summary: &str, rejected: &str) -> serde_json::Value {
    json!({
        "patch": {
            "summary": summary,
            "tags": ["Books"],
            "parameters": [id_parameter()],
            "responses": {
                "200": book_response("Updated book"),
                "400": error_response(rejected),
                "404": error_response("Book not found")
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books with catalog statistics",
                    "tags": ["Books"],
                    "parameters": [{
                        "name": "status",
                        "in": "query",
                        "required": false,
                        "schema": { "type": "string", "enum": ["available", "borrowed", "all"] }
                    }],
                    "responses": {
                        "200": {
                            "description": "Matching books and counts over the whole catalog",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookList" }
                                }
                            }
                        },
                        "400": error_response("Invalid status filter")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body(),
                    "responses": {
                        "201": book_response("Created book"),
                        "400": error_response("Missing fields or invalid ISBN"),
                        "409": error_response("ISBN already exists")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": book_response("Book"),
                        "400": error_response("Invalid book ID"),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Replace title, author and ISBN",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": book_body(),
                    "responses": {
                        "200": book_response("Updated book"),
                        "400": error_response("Invalid input"),
                        "404": error_response("Book not found"),
                        "409": error_response("ISBN already exists")
                    }
                },
                "delete": {
                    "summary": "Delete an available book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": {
                            "description": "Deletion confirmation",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/DeleteConfirmation" }
                                }
                            }
                        },
                        "400": error_response("Cannot delete a borrowed book"),
                        "404": error_response("Book not found")
                    }
                }
            },
            "/{id}/borrow": transition("Borrow a book", "Book is already borrowed"),
            "/{id}/return": transition("Return a book", "Book is not borrowed"),
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "isbn": { "type": "string", "description": "Normalized ISBN-10 or ISBN-13" },
                        "status": { "type": "string", "enum": ["available", "borrowed"] },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "isbn", "status", "createdAt", "updatedAt"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "isbn": { "type": "string", "description": "Hyphens and spaces are ignored" }
                    },
                    "required": ["title", "author", "isbn"]
                },
                "BookList": {
                    "type": "object",
                    "properties": {
                        "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } },
                        "statistics": {
                            "type": "object",
                            "properties": {
                                "total": { "type": "integer" },
                                "available": { "type": "integer" },
                                "borrowed": { "type": "integer" }
                            },
                            "required": ["total", "available", "borrowed"]
                        }
                    },
                    "required": ["books", "statistics"]
                },
                "DeleteConfirmation": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "id": { "type": "integer", "format": "int64" }
                    },
                    "required": ["message", "id"]
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_kernel::ModuleRegistry;
    use store::InMemoryBookStore;

    #[test]
    fn openapi_fragment_builds_a_valid_document() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(create_module(Arc::new(InMemoryBookStore::new())))
            .unwrap();

        let merged = libris_http::router::merged_openapi(&registry);
        let document: utoipa::openapi::OpenApi = serde_json::from_value(merged).unwrap();

        for path in [
            "/api/books",
            "/api/books/{id}",
            "/api/books/{id}/borrow",
            "/api/books/{id}/return",
            "/api/books/health",
        ] {
            assert!(document.paths.paths.contains_key(path), "missing {path}");
        }
        let schemas = document.components.as_ref().unwrap();
        for schema in ["Book", "BookInput", "BookList", "DeleteConfirmation", "ErrorResponse"] {
            assert!(schemas.schemas.contains_key(schema), "missing schema {schema}");
        }

        // Nothing is dropped on the way through the typed document
        let reparsed = serde_json::to_value(&document).unwrap();
        let list = &reparsed["paths"]["/api/books"]["get"];
        assert_eq!(
            list["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/BookList"
        );
        assert_eq!(
            list["parameters"][0]["schema"]["enum"],
            serde_json::json!(["available", "borrowed", "all"])
        );
        assert!(reparsed["paths"]["/api/books/health"]["get"]["responses"]["200"]["content"]
            ["text/plain"]
            .is_object());
        assert_eq!(
            reparsed["components"]["schemas"]["Book"]["properties"]["status"]["enum"],
            serde_json::json!(["available", "borrowed"])
        );
    }
}
