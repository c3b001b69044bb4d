use std::future::Future;

use anyhow::Context;
use axum::Router;
use libris_db::Database;
use libris_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A configured Libris instance: settings, open database and registered modules.
///
/// Lifecycle: [`Application::build`] opens the database, [`Application::prepare`]
/// initializes modules, applies migrations and starts them, and
/// [`Application::shutdown`] stops modules and closes the database.
/// [`Application::run`] does all of it around the HTTP server.
pub struct Application {
    settings: Settings,
    database: Database,
    registry: ModuleRegistry,
}

impl Application {
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let database = Database::connect(&settings.database)
            .await
            .context("failed to open database")?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &database)
            .context("failed to register modules")?;

        Ok(Self {
            settings,
            database,
            registry,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Apply pending migrations of every module; returns how many ran.
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let migrations = self.registry.collect_migrations();
        let applied = self.database.migrate(&migrations).await?;
        tracing::info!(applied, total = migrations.len(), "migrations complete");
        Ok(applied)
    }

    pub async fn prepare(&self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };

        self.registry.init_modules(&ctx).await?;
        self.migrate().await?;
        self.registry.start_modules(&ctx).await?;
        Ok(())
    }

    pub fn router(&self) -> Router {
        libris_http::build_router(&self.registry, &self.settings)
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let stopped = self.registry.stop_modules().await;
        self.database.close().await;
        stopped
    }

    /// Prepare, serve until `shutdown` resolves, then shut down.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(err) = self.prepare().await {
            self.database.close().await;
            return Err(err);
        }

        let served = libris_http::start_server(&self.registry, &self.settings, shutdown).await;
        let stopped = self.shutdown().await;

        tracing::info!("libris-app shutdown complete");
        served.and(stopped)
    }
}
