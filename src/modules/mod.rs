pub mod books;

use std::sync::Arc;

use libris_db::Database;
use libris_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, database: &Database) -> anyhow::Result<()> {
    let book_store = Arc::new(books::store::SqliteBookStore::new(database.pool().clone()));
    registry.register(books::create_module(book_store))?;
    Ok(())
}
