use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use beach_rally::cli::Cli;
use beach_rally::config::{ClientConfig, LogConfig, LogFormat};
use beach_rally::core::terminal::TerminalSession;
use beach_rally::ClientEngine;
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Logs go to a file or nowhere; stdout is the game screen.
fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::sink),
    };

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .json()
            .with_current_span(true)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .compact()
            .init(),
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    let config = ClientConfig::from(Cli::parse());
    init_tracing(&config.log)?;

    let mut engine = ClientEngine::new(config);
    engine.start();

    let mut session = TerminalSession::open()?;
    if !session.reports_key_release() {
        engine.emulate_key_release();
    }
    let result = engine.run(&mut session).await;

    // Restore the terminal before anything is printed.
    drop(session);
    result
}
