use crate::config::{FileRotation, LogType, LoggingConfig};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type DynLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync + 'static>;

fn span_events(spans: bool) -> FmtSpan {
    if spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn stdout_layer(color: bool, json: bool, spans: bool) -> DynLayer {
    if json {
        fmt::layer()
            .json()
            .with_span_events(span_events(spans))
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(color)
            .with_span_events(span_events(spans))
            .boxed()
    }
}

fn file_layer(
    path: &std::path::Path,
    json: bool,
    rotation: &FileRotation,
    max_files: usize,
    spans: bool,
) -> Result<(DynLayer, WorkerGuard)> {
    let directory = path.parent().unwrap_or(std::path::Path::new("."));
    let prefix = path
        .file_name()
        .context("Log file path needs a file name")?
        .to_string_lossy()
        .to_string();

    let mut builder = rolling::RollingFileAppender::builder().filename_prefix(prefix);

    builder = match rotation {
        FileRotation::Daily => builder.rotation(rolling::Rotation::DAILY),
        FileRotation::Hourly => builder.rotation(rolling::Rotation::HOURLY),
        FileRotation::Never => builder.rotation(rolling::Rotation::NEVER),
    };

    if max_files > 0 {
        builder = builder.max_log_files(max_files);
    }

    let appender = builder
        .build(directory)
        .context("Failed to create rolling log file appender")?;

    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events(spans))
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_span_events(span_events(spans))
            .boxed()
    };

    Ok((layer, guard))
}

/// Installs the global subscriber from config. Returned guards keep
/// the non blocking file writers flushing; hold them for process
/// lifetime
pub fn init(config: &LoggingConfig) -> Result<Vec<WorkerGuard>> {
    config.validate()?;

    let mut layers: Vec<DynLayer> = Vec::with_capacity(config.sinks.len());
    let mut guards = Vec::new();

    for sink in &config.sinks {
        match &sink.dest {
            LogType::Stdout { color, json } => {
                layers.push(stdout_layer(*color, *json, sink.spans));
            }
            LogType::File {
                path,
                json,
                rotation,
                max_files,
            } => {
                let (layer, guard) = file_layer(path, *json, rotation, *max_files, sink.spans)?;
                layers.push(layer);
                guards.push(guard);
            }
        }
    }

    let filter = EnvFilter::try_new(&config.level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Could not build log filter")?;

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Global subscriber already installed")?;

    Ok(guards)
}
