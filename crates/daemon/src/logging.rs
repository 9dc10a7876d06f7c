//! Tracing subscriber setup
//!
//! - `RUST_LOG`: filter directives (default `ohq=info`)
//! - `OHQ_LOG_FORMAT`: `pretty` (default) or `json`
//! - `OHQ_LOG_DIR`: also write daily-rotated JSON logs to this directory

use crate::telemetry;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "ohq=info";
const LOG_FILE_PREFIX: &str = "ohq-daemon.log";

pub type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must live until exit.
pub fn init() -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let log_format = std::env::var("OHQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let mut layers: Vec<BoxedLayer> = Vec::new();
    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut guard = None;
    if let Ok(dir) = std::env::var("OHQ_LOG_DIR") {
        let dir = shellexpand::tilde(&dir).into_owned();
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard = Some(file_guard);
    }

    let (otel_layer, otel_note) = telemetry::layer()?;
    layers.extend(otel_layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(note) = otel_note {
        tracing::info!("{}", note);
    }
    Ok(guard)
}
