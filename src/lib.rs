//! Libris application library
//!
//! The library catalog modules plus the [`Application`] that wires them to
//! the database and HTTP server.

pub mod app;
pub mod modules;

pub use app::Application;
