use anyhow::Context;
use clap::{Parser, Subcommand};
use libris_app::Application;
use libris_kernel::settings::Settings;

/// Libris library catalog service
#[derive(Debug, Parser)]
#[command(name = "libris", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Libris settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config => {
            println!("{settings:#?}");
            Ok(())
        }
        Command::Migrate => {
            libris_telemetry::init(&settings.telemetry)?;
            let app = Application::build(settings).await?;
            let applied = app.migrate().await;
            app.database().close().await;
            println!("applied {} migration(s)", applied?);
            Ok(())
        }
        Command::Serve => {
            libris_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "libris server starting");
            let app = Application::build(settings).await?;
            app.run(libris_http::shutdown_signal()).await
        }
    }
}
