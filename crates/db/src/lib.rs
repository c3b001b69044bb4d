//! SQLite connection factory and migration runner for Libris.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::Context;
use libris_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _libris_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        PRIMARY KEY (module, id)
    )
"#;

/// Handle to the application's database.
///
/// Opened once at startup, shared by cloning the inner pool, and closed
/// explicitly on shutdown.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for the configured URL, creating the SQLite file if needed.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so pin a single
        // connection and never let it expire.
        let pool_options = if settings.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to database '{}'", settings.url))?;

        tracing::info!(target: "libris-db", url = %settings.url, "database connected");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded, each in its own transaction.
    /// Returns how many were applied.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::raw_sql(MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create migrations table")?;

        let applied: HashSet<(String, String)> =
            sqlx::query_as::<_, (String, String)>("SELECT module, id FROM _libris_migrations")
                .fetch_all(&self.pool)
                .await
                .context("failed to read applied migrations")?
                .into_iter()
                .collect();

        let mut count = 0;
        for (module, migration) in migrations {
            if applied.contains(&(module.clone(), migration.id.to_string())) {
                tracing::debug!(target: "libris-db", module = %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await.context("failed to begin migration")?;

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;

            sqlx::query("INSERT INTO _libris_migrations (module, id, applied_at) VALUES (?, ?, ?)")
                .bind(module.as_str())
                .bind(migration.id)
                .bind(OffsetDateTime::now_utc())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to record migration '{}/{}'", module, migration.id))?;

            tx.commit()
                .await
                .with_context(|| format!("failed to commit migration '{}/{}'", module, migration.id))?;

            tracing::info!(target: "libris-db", module = %module, id = migration.id, "migration applied");
            count += 1;
        }

        Ok(count)
    }

    /// Wait for checked-out connections to return, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "libris-db", "database connection closed");
    }
}
