mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
};

use chrono::Utc;
use sizzle_core::{
    config::{self, AppConfig},
    load_catalog, GameSession, SaveError, SaveManager,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let catalog = load_catalog(&config.content_dir)
        .with_context(|| format!("failed to load content from {}", config.content_dir.display()))?;
    let saves = SaveManager::new(&config.save_path);
    let (session, start) = GameSession::start(catalog, saves, Utc::now());
    tracing::info!(?start, "Session ready");
    let session = session.with_autosave(config.autosave_interval());

    let mut app = app::SizzleApp::new(session);
    let outcome = app.run().await;
    report_exit(outcome, app.take_shutdown_error(), &mut io::stderr())
}

/// Tell the player about a lost save before surfacing any terminal error.
fn report_exit(
    outcome: Result<()>,
    shutdown_error: Option<SaveError>,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(err) = shutdown_error {
        writeln!(out, "Progress could not be saved: {err}")?;
    }
    outcome
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(&config.log_dir);
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("sizzlestar.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_error() -> SaveError {
        SaveError::Write {
            path: PathBuf::from("save.szs"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    #[test]
    fn save_error_is_reported_even_when_the_run_failed() {
        let mut out = Vec::new();
        let result = report_exit(
            Err(anyhow::anyhow!("failed to leave alternate screen")),
            Some(write_error()),
            &mut out,
        );

        assert!(result.is_err());
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.starts_with("Progress could not be saved: failed to write save.szs"));
    }

    #[test]
    fn clean_exit_prints_nothing() {
        let mut out = Vec::new();
        assert!(report_exit(Ok(()), None, &mut out).is_ok());
        assert!(out.is_empty());
    }
}
